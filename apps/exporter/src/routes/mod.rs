mod health;
mod metrics;

macros_utils::routes! {
    load health,
    load metrics,
}
