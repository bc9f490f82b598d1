//! Short, stable failure messages derived from raw command error output.

/// Builds the outcome message for a failed smoketest from its stderr text.
///
/// Connection problems get a dedicated message; everything else collapses
/// into the generic failure message so metric consumers see stable text.
pub fn classify(service: &str, raw_error: &str) -> String {
    let normalized = normalize(raw_error);

    if is_connection_failure(&normalized) {
        format!("Smoketest command is unable to connect to service: {service}")
    } else {
        format!("{service} smoketest command has been failed.")
    }
}

/// Lower-cases the text and folds commas, newlines and whitespace runs into
/// single spaces, turning multi-line shell errors into one line.
pub fn normalize(raw: &str) -> String {
    raw.to_lowercase()
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_connection_failure(normalized: &str) -> bool {
    normalized.contains("connect")
        && ["refused", "failed", "denied"]
            .iter()
            .any(|reason| normalized.contains(reason))
}
