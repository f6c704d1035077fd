//! Parsing of the `qacct -j` post-mortem accounting output.

use genocat_core::traits::TerminatedJob;

/// Extract the `exit_status` and `failed` fields from `qacct` output.
///
/// Returns `None` unless both fields are present, in which case the raw
/// textual values are kept for classification (the `failed` field may
/// carry a suffix like `25 : rescheduling`).
pub fn parse_accounting(output: &str) -> Option<TerminatedJob> {
    let mut exit_status = None;
    let mut failed = None;

    for line in output.lines() {
        if let Some(value) = line.strip_prefix("exit_status") {
            exit_status = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("failed") {
            failed = Some(value.trim().to_string());
        }
    }

    match (exit_status, failed) {
        (Some(exit_status), Some(failed)) => Some(TerminatedJob {
            exit_status,
            failed,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QACCT_OUTPUT: &str = "==============================================================\n\
qname        default.q\n\
hostname     node04\n\
jobname      bwa_1001\n\
jobnumber    1097\n\
failed       0\n\
exit_status  1\n\
ru_wallclock 4021\n";

    #[test]
    fn test_parses_exit_status_and_failed() {
        let record = parse_accounting(QACCT_OUTPUT).unwrap();
        assert_eq!(record.exit_status, "1");
        assert_eq!(record.failed, "0");
    }

    #[test]
    fn test_failed_keeps_its_raw_suffix() {
        let record =
            parse_accounting("failed       25 : rescheduling\nexit_status  0\n").unwrap();
        assert_eq!(record.failed, "25 : rescheduling");
    }

    #[test]
    fn test_missing_fields_yield_none() {
        assert!(parse_accounting("jobname bwa_1001\n").is_none());
        assert!(parse_accounting("exit_status 0\n").is_none());
    }
}
