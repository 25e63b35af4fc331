use super::*;

const SAMPLE_CONFIG: &str = r#"
app_name = "Beacon"
exe_name = "Beacon.exe"
window_class = "BeaconMainWindow"
service_name = "BeaconService"
app_settings_key = 'HKEY_CURRENT_USER\Software\Beacon\Beacon2'
uninstall_settings_key = 'HKEY_LOCAL_MACHINE\Software\Microsoft\Windows\CurrentVersion\Uninstall\{Beacon}_is1'
archive_name = "Beacon"
extra_config_file = "beacon_extra.conf"
data_dir = "Beacon/Beacon2"
"#;

#[test]
fn parse_config_applies_policy_defaults() {
    let config = ProductConfig::from_toml_str(SAMPLE_CONFIG).expect("config should parse");
    assert_eq!(config.app_name, "Beacon");
    assert_eq!(config.window_class.as_deref(), Some("BeaconMainWindow"));
    assert!(config.window_title.is_none());
    assert_eq!(config.uninstall_value, "UninstallString");
    assert_eq!(config.user_id_value, "userId");
    assert_eq!(config.silent_flag, "/VERYSILENT");
    assert_eq!(config.uninstaller_entry, "uninstall.exe");
    assert_eq!(config.timing.close_timeout_ms, 5000);
    assert_eq!(config.timing.poll_interval_ms, 100);
    assert_eq!(config.timing.settle_delay_ms, 1000);
}

#[test]
fn parse_config_with_partial_timing_override() {
    let content = format!("{SAMPLE_CONFIG}\n[timing]\nclose_timeout_ms = 2000\n");
    let config = ProductConfig::from_toml_str(&content).expect("config should parse");
    assert_eq!(config.timing.close_timeout_ms, 2000);
    assert_eq!(config.timing.poll_interval_ms, 100);
    assert_eq!(
        config.timing.close_timeout(),
        std::time::Duration::from_millis(2000)
    );
}

#[test]
fn config_rejects_missing_window_identity() {
    let content = SAMPLE_CONFIG.replace("window_class = \"BeaconMainWindow\"\n", "");
    let err = ProductConfig::from_toml_str(&content).expect_err("must reject");
    assert!(err.to_string().contains("window_class or a window_title"));
}

#[test]
fn config_rejects_exe_name_with_directory() {
    let content = SAMPLE_CONFIG.replace("\"Beacon.exe\"", r#"'C:\Beacon\Beacon.exe'"#);
    let err = ProductConfig::from_toml_str(&content).expect_err("must reject");
    assert!(err.to_string().contains("exe_name"));
}

#[test]
fn config_rejects_poll_interval_not_below_timeout() {
    let content = format!(
        "{SAMPLE_CONFIG}\n[timing]\nclose_timeout_ms = 100\npoll_interval_ms = 100\n"
    );
    let err = ProductConfig::from_toml_str(&content).expect_err("must reject");
    assert!(err.to_string().contains("poll_interval_ms"));
}

#[test]
fn config_renders_back_to_toml() {
    let config = ProductConfig::from_toml_str(SAMPLE_CONFIG).expect("config should parse");
    let rendered = config.to_toml_string().expect("must render");
    let reparsed = ProductConfig::from_toml_str(&rendered).expect("must reparse");
    assert_eq!(reparsed, config);
}

#[test]
fn activate_message_name_drops_whitespace() {
    let mut config = ProductConfig::from_toml_str(SAMPLE_CONFIG).expect("config should parse");
    assert_eq!(config.activate_message_name(), "BeaconAppActivate");
    config.app_name = "Beacon VPN".to_string();
    assert_eq!(config.activate_message_name(), "BeaconVPNAppActivate");
}

#[test]
fn remove_quotes_strips_mixed_quote_runs() {
    assert_eq!(remove_quotes("'\"C:\\x\"'"), "C:\\x");
    assert_eq!(remove_quotes("\"C:\\Prev\\uninstall.exe\""), "C:\\Prev\\uninstall.exe");
    assert_eq!(remove_quotes("C:\\plain.exe"), "C:\\plain.exe");
    assert_eq!(remove_quotes("\"\"''"), "");
    assert_eq!(remove_quotes(""), "");
}

#[test]
fn remove_quotes_is_idempotent() {
    for input in ["'\"C:\\x\"'", "\"a b\"", "'", "x'y", "\"'\"inner'\"'"] {
        let once = remove_quotes(input);
        assert_eq!(remove_quotes(once), once, "input: {input}");
    }
}

#[test]
fn remove_quotes_keeps_inner_quotes() {
    assert_eq!(remove_quotes("\"C:\\it's\\u.exe\""), "C:\\it's\\u.exe");
}

#[test]
fn uninstaller_directory_handles_both_separators() {
    assert_eq!(
        uninstaller_directory("\"C:\\Program Files\\Beacon\\uninstall.exe\""),
        Some("C:\\Program Files\\Beacon")
    );
    assert_eq!(
        uninstaller_directory("/opt/beacon/uninstall.exe"),
        Some("/opt/beacon")
    );
    assert_eq!(uninstaller_directory("uninstall.exe"), None);
}

#[test]
fn archive_entry_match_uses_full_fixed_width_name() {
    let entries = vec![
        ArchiveEntryName::from_stored("Beacon.exe\0"),
        ArchiveEntryName::from_stored("uninstall.exe"),
        ArchiveEntryName::from_stored("uninstall.exe\0"),
    ];
    let wanted = ArchiveEntryName::fixed_width("uninstall.exe");
    assert_eq!(find_entry(&entries, &wanted), Some(2));
    assert_eq!(wanted.display_name(), "uninstall.exe");
    assert_eq!(wanted.to_string(), "uninstall.exe");
}

#[test]
fn archive_entry_match_rejects_prefix_only_names() {
    let entries = vec![
        ArchiveEntryName::from_stored("uninstall.exe\0old"),
        ArchiveEntryName::from_stored("uninstall.exe"),
    ];
    let wanted = ArchiveEntryName::fixed_width("uninstall.exe");
    assert_eq!(find_entry(&entries, &wanted), None);
}

#[test]
fn step_outcome_codes_follow_poll_contract() {
    assert_eq!(StepOutcome::Progress(30).code(), 30);
    assert_eq!(StepOutcome::COMPLETE.code(), 100);
    assert_eq!(StepOutcome::Failed.code(), -1);
    assert_eq!(StepOutcome::AlternateRegistryView.code(), -2);
    assert_eq!(StepOutcome::from_code(65), Some(StepOutcome::Progress(65)));
    assert_eq!(StepOutcome::from_code(-2), Some(StepOutcome::AlternateRegistryView));
    assert_eq!(StepOutcome::from_code(-3), None);
    assert_eq!(StepOutcome::from_code(101), None);
    assert!(StepOutcome::COMPLETE.is_complete());
    assert!(!StepOutcome::Progress(60).is_complete());
    assert!(StepOutcome::Failed.is_error());
}

#[test]
fn installer_error_codes_start_at_one() {
    assert_eq!(InstallerError::Other.code(), 1);
    assert_eq!(InstallerError::Kill.code(), 3);
    assert_eq!(InstallerError::Uninstall.code(), 6);
    assert_eq!(InstallerError::DeleteCustomDir.code(), 9);
}

struct ScriptedBlock {
    name: &'static str,
    weight: f64,
    outcomes: Vec<StepOutcome>,
    polls: usize,
}

impl ScriptedBlock {
    fn boxed(name: &'static str, weight: f64, outcomes: Vec<StepOutcome>) -> Box<Self> {
        Box::new(Self {
            name,
            weight,
            outcomes,
            polls: 0,
        })
    }
}

impl InstallBlock for ScriptedBlock {
    fn name(&self) -> &str {
        self.name
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn execute_step(&mut self) -> StepOutcome {
        let outcome = self
            .outcomes
            .get(self.polls)
            .copied()
            .unwrap_or(StepOutcome::COMPLETE);
        self.polls += 1;
        outcome
    }
}

#[test]
fn plan_weights_block_progress_into_overall_progress() {
    let mut plan = InstallPlan::new();
    plan.push(ScriptedBlock::boxed(
        "uninstall_prev",
        1.0,
        vec![
            StepOutcome::Progress(30),
            StepOutcome::Progress(60),
            StepOutcome::COMPLETE,
        ],
    ));
    plan.push(ScriptedBlock::boxed(
        "copy_files",
        3.0,
        vec![StepOutcome::Progress(50), StepOutcome::COMPLETE],
    ));

    let mut seen = Vec::new();
    loop {
        match plan.poll() {
            PlanStatus::Running { overall, .. } => seen.push(overall),
            PlanStatus::Finished => break,
            PlanStatus::Failed { block, .. } => panic!("unexpected failure in {block}"),
        }
    }
    assert_eq!(seen, vec![7, 15, 25, 62]);
    assert_eq!(plan.overall_progress(), 100);
    assert_eq!(plan.poll(), PlanStatus::Finished);
}

#[test]
fn plan_overall_progress_never_decreases() {
    let mut plan = InstallPlan::new();
    plan.push(ScriptedBlock::boxed(
        "uninstall_prev",
        1.0,
        vec![
            StepOutcome::Progress(60),
            StepOutcome::Progress(65),
            StepOutcome::Progress(10),
            StepOutcome::COMPLETE,
        ],
    ));
    plan.push(ScriptedBlock::boxed("tail", 1.0, vec![StepOutcome::COMPLETE]));

    let mut last = 0;
    while let PlanStatus::Running { overall, .. } = plan.poll() {
        assert!(overall >= last, "{overall} < {last}");
        last = overall;
    }
    assert_eq!(plan.overall_progress(), 100);
}

#[test]
fn plan_stops_on_failure_and_keeps_reporting_it() {
    let mut plan = InstallPlan::new();
    plan.push(ScriptedBlock::boxed(
        "uninstall_prev",
        1.0,
        vec![StepOutcome::Progress(30), StepOutcome::AlternateRegistryView],
    ));
    plan.push(ScriptedBlock::boxed("tail", 1.0, Vec::new()));

    assert!(matches!(plan.poll(), PlanStatus::Running { .. }));
    let expected = PlanStatus::Failed {
        block: "uninstall_prev".to_string(),
        outcome: StepOutcome::AlternateRegistryView,
    };
    assert_eq!(plan.poll(), expected);
    assert_eq!(plan.poll(), expected);
    assert_eq!(plan.current_block(), Some("uninstall_prev"));
}

#[test]
fn plan_treats_unusable_weights_as_equal_shares() {
    let mut plan = InstallPlan::new();
    plan.push(ScriptedBlock::boxed(
        "a",
        0.0,
        vec![StepOutcome::Progress(50), StepOutcome::COMPLETE],
    ));
    plan.push(ScriptedBlock::boxed("b", f64::NAN, vec![StepOutcome::COMPLETE]));

    assert_eq!(
        plan.poll(),
        PlanStatus::Running {
            block: "a".to_string(),
            overall: 25
        }
    );
    assert_eq!(
        plan.poll(),
        PlanStatus::Running {
            block: "a".to_string(),
            overall: 50
        }
    );
    assert_eq!(plan.poll(), PlanStatus::Finished);
}

#[test]
fn empty_plan_is_finished_immediately() {
    let mut plan = InstallPlan::new();
    assert!(plan.is_empty());
    assert_eq!(plan.poll(), PlanStatus::Finished);
    assert_eq!(plan.overall_progress(), 100);
}
