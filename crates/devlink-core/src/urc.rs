//! Unsolicited result codes (URCs) reported by devices.

/// Code a device reports after switching to a newly sent key.
pub const URC_PSK_SUCCESS: &str = "PSK:SET";

/// Codes signalling a failed key rotation, with their descriptions.
const PSK_ERROR_URCS: [(&str, &str); 7] = [
    ("DL:UNK", "Downlink unknown"),
    ("PSK:EQER", "Set PSK does not equal earlier PSK"),
    ("PSK:DLNA", "Downlink not allowed"),
    ("PSK:DLER", "Downlink (syntax) error"),
    ("PSK:#ERR", "Error processing (downlink) value"),
    ("PSK:HSER", "SHA256 hash error"),
    ("PSK:CSER", "Checksum error"),
];

/// Error suffixes any subsystem may report as `<SUBSYSTEM>:<SUFFIX>`.
const ERROR_SUFFIXES: [(&str, &str); 8] = [
    ("UNK", "Downlink unknown"),
    ("EQER", "Set value does not equal earlier value"),
    ("DLNA", "Downlink not allowed"),
    ("DLER", "Downlink (syntax) error"),
    ("#ERR", "Error processing (downlink) value"),
    ("HSER", "SHA256 hash error"),
    ("CSER", "Checksum error"),
    ("ERR", "Error"),
];

/// Check whether a code signals a failed key rotation.
pub fn is_psk_error_urc(code: &str) -> bool {
    PSK_ERROR_URCS.iter().any(|(c, _)| *c == code)
}

/// Check whether a code is an error code of any subsystem.
pub fn is_error_urc(code: &str) -> bool {
    error_suffix(code).is_some()
}

fn error_suffix(code: &str) -> Option<&'static str> {
    let (subsystem, suffix) = code.split_once(':')?;
    if subsystem.is_empty() {
        return None;
    }
    ERROR_SUFFIXES
        .iter()
        .find(|(s, _)| *s == suffix)
        .map(|(_, message)| *message)
}

/// Human readable description of an error code.
pub fn message_from_code(code: &str) -> &'static str {
    PSK_ERROR_URCS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, message)| *message)
        .or_else(|| error_suffix(code))
        .unwrap_or("Unknown URC")
}

/// Render error codes as `CODE (description), ...`.
pub fn describe_errors<'a>(codes: impl IntoIterator<Item = &'a String>) -> String {
    codes
        .into_iter()
        .map(|code| format!("{} ({})", code, message_from_code(code)))
        .collect::<Vec<_>>()
        .join(", ")
}
