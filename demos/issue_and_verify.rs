//! Issue a license and verify it from two devices.
//!
//! # Running
//!
//! ```bash
//! export SEATWARDEN_ADMIN_TOKEN="change-me"
//! cargo run --example issue_and_verify
//! ```
//!
//! The snapshot is written to a scratch directory under the system temp
//! dir, so running the example never touches a real license store.

use seatwarden::{
    IssueRequest, LicenseManager, ScriptScope, SeatwardenConfig, SeatwardenError, VerifyRequest,
};

fn main() {
    let store_path = std::env::temp_dir()
        .join("seatwarden-example")
        .join("licenses.json");

    // Admin token CAN come from the environment; fall back for the demo only.
    let config = SeatwardenConfig {
        admin_token: "change-me".to_string(),
        store_path: Some(store_path),
        ..SeatwardenConfig::default()
    }
    .with_env_overrides();
    let token = config.admin_token.clone();

    let manager = match LicenseManager::new(config) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&manager, &token) {
        eprintln!("Error ({}): {}", e.kind().status_code(), e);
        std::process::exit(1);
    }
}

fn run(manager: &LicenseManager, token: &str) -> Result<(), SeatwardenError> {
    let issued = manager.issue(
        Some(token),
        &IssueRequest::new("DEMO-KEY-0001")
            .script(ScriptScope::single("FKBP-PRO-1.0"))
            .days(30)
            .max_devices(1)
            .reset_devices(true),
    )?;
    println!("Issued {} until {}", issued.key, issued.expires_at);

    for fingerprint in ["laptop-a", "laptop-a", "desktop-b"] {
        let request = VerifyRequest::new("DEMO-KEY-0001", "FKBP-PRO-1.0", fingerprint);
        let outcome = manager.verify(&request)?;
        match outcome.reason {
            None => println!(
                "{}: valid, {} day(s) left",
                fingerprint,
                outcome.days_left.unwrap_or_default()
            ),
            Some(reason) => println!("{}: refused ({})", fingerprint, reason),
        }
    }

    let devices = manager.revoke_device(Some(token), "DEMO-KEY-0001", "laptop-a")?;
    println!("After revoke: {:?}", devices.devices);

    let request = VerifyRequest::new("DEMO-KEY-0001", "FKBP-PRO-1.0", "desktop-b");
    let outcome = manager.verify(&request)?;
    println!("desktop-b after revoke: ok={}", outcome.ok);

    Ok(())
}
