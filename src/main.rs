use anyhow::Context;
use household_lib::{suite, HarnessConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    household_lib::init_logging();

    let config = HarnessConfig::from_env().context("Failed to load harness configuration")?;
    let report = suite::run(&config).await;

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize suite report")?;
    println!("{}", json);

    if !report.passed() {
        let failed: Vec<&str> = report.failures().map(|c| c.name.as_str()).collect();
        anyhow::bail!("{} case(s) failed: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}
