use anyhow::Context;
use log::info;
use plan_forecast::*;
use std::fs::{self, File};
use std::path::PathBuf;

const SAMPLE_PLAN: &str = include_str!("sample_plan.yaml");

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let mut args = std::env::args().skip(1);
    let text = match args.next() {
        Some(path) => fs::read_to_string(&path).with_context(|| format!("reading plan {path}"))?,
        None => SAMPLE_PLAN.to_string(),
    };
    let output_dir = PathBuf::from(args.next().unwrap_or_else(|| "forecast_output".to_string()));

    let document = PlanDocument::from_templated_yaml(&text).context("parsing plan document")?;
    let plan = Plan::from_document(&document)?;

    println!("📋 {}", plan.configuration.summary());
    for (list, count) in plan.summary() {
        println!("   {:<18} {}", list, count);
    }
    for mortgage in &plan.mortgages {
        println!(
            "   Mortgage {}: {:.2} %/yr, payment $ {}",
            mortgage.name,
            mortgage.display_rate(),
            mortgage.payment()
        );
    }

    let forecast = ForecastProcessor::process_with_verification(&document)?;

    for warning in &forecast.warnings {
        println!("⚠️  {}", warning);
    }

    println!("\n📈 Balances after {} months:", forecast.months_assessed);
    for entity in plan.balance_entities() {
        if let Some(balance) = forecast.final_balance(&entity.name) {
            println!("   {:<18} {:>14}", entity.name, balance);
        }
    }
    if let Some(total) = forecast.final_balance(TOTAL) {
        println!("   {:<18} {:>14}", TOTAL, total);
    }

    fs::create_dir_all(&output_dir)?;
    let balances_path = output_dir.join("balance_log.csv");
    let ledger_path = output_dir.join("transaction_log.csv");
    forecast.write_balance_csv(File::create(&balances_path)?)?;
    forecast.write_transaction_csv(File::create(&ledger_path)?)?;
    info!(
        "Wrote {} balance rows and {} changes",
        forecast.balance_log.len(),
        forecast.transaction_log.len()
    );

    println!("\n✅ Wrote {} and {}", balances_path.display(), ledger_path.display());
    Ok(())
}
