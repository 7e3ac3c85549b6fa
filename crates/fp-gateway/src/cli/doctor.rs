use fp_domain::config::{Config, ConfigSeverity};

/// Run diagnostic checks against the configuration and the store path.
/// Returns `Ok(true)` when every check passes.
pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("feedpipe doctor");
    println!("===============\n");

    let mut all_passed = true;

    check_config_file(config_path, &mut all_passed);
    check_config_validation(config, &mut all_passed);
    check_store_opens(config, &mut all_passed).await;
    check_bind_addr(config, &mut all_passed);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

fn check_config_file(config_path: &str, all_passed: &mut bool) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists { config_path.to_owned() } else { format!("{config_path} not found (using defaults)") },
    );
    if !exists {
        *all_passed = false;
    }
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
    } else {
        print_check(
            "Config validation",
            error_count == 0,
            format!("{} issue(s) ({error_count} error(s))", issues.len()),
        );
        for issue in &issues {
            println!("      {issue}");
        }
        if error_count > 0 {
            *all_passed = false;
        }
    }
}

async fn check_store_opens(config: &Config, all_passed: &mut bool) {
    let opened = fp_store::Store::open(&config.store.database_path).await.is_ok();
    print_check(
        "Store opens and migrates",
        opened,
        if opened { config.store.database_path.clone() } else { format!("{} (failed to open)", config.store.database_path) },
    );
    if !opened {
        *all_passed = false;
    }
}

fn check_bind_addr(config: &Config, all_passed: &mut bool) {
    let ok = config.server.bind_addr.parse::<std::net::SocketAddr>().is_ok();
    print_check(
        "Bind address parses",
        ok,
        if ok { config.server.bind_addr.clone() } else { format!("{} (not a valid socket address)", config.server.bind_addr) },
    );
    if !ok {
        *all_passed = false;
    }
}

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
