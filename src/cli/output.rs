use s9s_ft::config::Settings;
use s9s_ft::counters::{CheckTotals, CounterStore};
use s9s_ft::suite::{SuiteKind, SuiteReport, TestOutcome};

pub(crate) fn print_run_header(settings: &Settings, arch: &str) {
    println!("s9s functional tests ({arch})");
    println!("  controller: {}", settings.controller.url());
    println!("  cmon user:  {}", settings.controller.user);
    println!(
        "  password:   {}",
        mask_value(&settings.controller.password)
    );
    println!("  lxd:        {}", settings.lxd.endpoint);
    println!("  log file:   {}", settings.log.file.display());
}

pub(crate) fn print_suite_list() {
    for kind in SuiteKind::ALL {
        let infra = if kind.needs_infrastructure() {
            ""
        } else {
            " [local]"
        };
        println!("{:<18} {}{infra}", kind.name(), kind.description());
    }
}

pub(crate) fn print_run_summary(reports: &[SuiteReport], totals: &CheckTotals) {
    for report in reports {
        println!(
            "{}: {} test(s), {} check(s)",
            report.suite,
            report.tests.len(),
            report.checks()
        );
        for test in &report.tests {
            let platform = test
                .platform
                .map(|p| format!(" [{p}]"))
                .unwrap_or_default();
            println!("  {}{platform} ... {}", test.name, test.outcome);
        }
    }
    let verdict = if totals.successful { "OK" } else { "FAILED" };
    println!(
        "Checks: {} performed, {} succeeded, {} failed, {} skipped: {verdict}",
        totals.checks,
        totals.successes(),
        totals.failed + totals.errors,
        totals.skipped
    );
}

pub(crate) fn print_counters(store: &CounterStore) {
    println!("# {}", store.path().display());
    for (key, value) in store.entries() {
        println!("{key}={value}");
    }
}

pub(crate) fn failed_tests(reports: &[SuiteReport]) -> Vec<String> {
    reports
        .iter()
        .flat_map(|report| {
            report
                .tests
                .iter()
                .filter(|test| test.outcome != TestOutcome::Passed)
                .map(move |test| format!("{}::{}", report.suite, test.name))
        })
        .collect()
}

pub(crate) fn mask_value(value: &str) -> String {
    let chars: Vec<char> = value.trim().chars().collect();
    if chars.len() <= 4 {
        "****".to_string()
    } else {
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("****{tail}")
    }
}

#[cfg(test)]
mod tests {
    use s9s_ft::suite::{Platform, TestRecord};

    use super::*;

    #[test]
    fn test_mask_value_short() {
        assert_eq!(mask_value("abc"), "****");
    }

    #[test]
    fn test_mask_value_long() {
        assert_eq!(mask_value("secretvalue"), "****alue");
    }

    #[test]
    fn test_mask_value_multibyte() {
        assert_eq!(mask_value("a€€"), "****");
        assert_eq!(mask_value("pässwörd€"), "****örd€");
    }

    #[test]
    fn test_failed_tests_lists_non_passing() {
        let mut report = SuiteReport::new(SuiteKind::Mssql);
        report.record(TestRecord::new(
            "test1_ubuntu_cluster_all".to_string(),
            Some(Platform::Ubuntu),
            3,
            TestOutcome::Passed,
        ));
        report.record(TestRecord::new(
            "test2_centos_cluster_all".to_string(),
            Some(Platform::Centos),
            1,
            TestOutcome::Error {
                message: "lxd down".to_string(),
            },
        ));
        assert_eq!(
            failed_tests(&[report]),
            ["mssql::test2_centos_cluster_all"]
        );
    }
}
