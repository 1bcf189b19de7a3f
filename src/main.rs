// Entry point and high-level CLI flow.
//
// The binary drives the library the way the dashboard shell would:
// - Option [1] loads the bundled datasets, printing diagnostics.
// - Option [2] asks for a filter selection, recomputes every chart
//   payload and exports them as JSON/CSV with console previews.
// - After generating chart data, the user can choose to go back to the
//   selection menu or exit.
use drugstats::filter::{FilterStore, FilterUpdate, RegionSelection};
use drugstats::loader;
use drugstats::output;
use drugstats::pipeline::ChartData;
use drugstats::types::{Dataset, Record};
use drugstats::util::{format_int, parse_i32_safe};
use once_cell::sync::Lazy;
use std::io::{self, Write};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

// Simple in-memory app state so we only load the datasets once but can
// recompute chart data multiple times in a single run.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| Mutex::new(AppState { data: None }));

struct AppState {
    data: Option<Vec<Record>>,
}

/// Print a prompt and read a single trimmed line of input.
fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Ask the user whether to go back to the menu after generating chart
/// data.
///
/// Returns `true` if the user chose `Y`, `false` if they chose `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        match read_line("Back to Menu (Y/N): ").to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

/// Handle option [1]: load every bundled dataset that is present.
///
/// Datasets load independently; a missing file costs only that dataset.
fn handle_load() {
    let mut records: Vec<Record> = Vec::new();
    load_into(&mut records, "data/Drug_seizures_2018_2022.json", loader::load_seizures);
    load_into(&mut records, "data/Prices_of_drugs.json", loader::load_prices);
    load_into(&mut records, "data/Individual_drug_seizures.csv", loader::load_trafficking);
    load_into(&mut records, "data/Prevalence_of_drug_use_General.json", |path| {
        loader::load_prevalence(path, Dataset::PrevalenceGeneral)
    });
    load_into(&mut records, "data/Prevalence_of_drug_use_NPS.json", |path| {
        loader::load_prevalence(path, Dataset::PrevalenceNps)
    });

    if records.is_empty() {
        println!("Error: no datasets could be loaded.\n");
        return;
    }
    println!("Total: {} records ready.\n", format_int(records.len() as i64));
    let mut state = APP_STATE.lock().unwrap();
    state.data = Some(records);
}

fn load_into<F>(records: &mut Vec<Record>, path: &str, load: F)
where
    F: Fn(&str) -> Result<(Vec<Record>, loader::LoadReport), loader::LoadError>,
{
    match load(path) {
        Ok((data, report)) => {
            println!(
                "{}: {} rows loaded, {} kept, {} skipped",
                path,
                format_int(report.total_rows as i64),
                format_int(report.kept_rows as i64),
                format_int(report.parse_errors as i64)
            );
            if report.missing_year > 0 {
                println!(
                    "Note: {} rows have no usable year.",
                    format_int(report.missing_year as i64)
                );
            }
            records.extend(data);
        }
        Err(e) => {
            eprintln!("Failed to load {}: {}", path, e);
        }
    }
}

/// Parse a `YYYY-YYYY` range; an empty or malformed answer keeps the
/// default.
fn parse_year_range(input: &str) -> Option<(i32, i32)> {
    let (min, max) = input.split_once('-')?;
    let min = parse_i32_safe(Some(min))?;
    let max = parse_i32_safe(Some(max))?;
    if min <= max {
        Some((min, max))
    } else {
        None
    }
}

/// Handle option [2]: pick filters, recompute chart data and export it.
///
/// This function is intentionally side-effectful:
/// - writes the JSON chart payloads,
/// - writes CSVs for the flat year/price series,
/// - and prints Markdown previews to the console.
fn handle_generate_chart_data() {
    let data = {
        let state = APP_STATE.lock().unwrap();
        state.data.clone()
    };
    let Some(data) = data else {
        println!("Error: No data loaded. Please load the datasets first (option 1).\n");
        return;
    };

    let mut store = FilterStore::default();
    let year_input = read_line("Year range (e.g. 2019-2021, Enter for 2018-2022): ");
    if let Some(range) = parse_year_range(&year_input) {
        store.update(FilterUpdate {
            year_range: Some(range),
            ..FilterUpdate::default()
        });
    }
    let country = read_line("Country (Enter for all): ");
    if !country.is_empty() {
        store.update(FilterUpdate {
            region: Some(RegionSelection {
                region: None,
                sub_region: None,
                country: Some(country),
            }),
            ..FilterUpdate::default()
        });
    }

    println!("\nComputing chart data...");
    let charts = ChartData::compute(&data, store.state());
    println!("Outputs saved to individual files...\n");

    if let Err(e) = output::write_json("map_rows.json", &charts.map_rows) {
        eprintln!("Write error: {}", e);
    }
    println!("World map rollup ({} rows)", format_int(charts.map_rows.len() as i64));
    output::preview_table_rows(&charts.map_rows, 3);
    println!("(Full rollup exported to map_rows.json)\n");

    if let Err(e) = output::write_json("country_drug.json", &charts.country_drug) {
        eprintln!("Write error: {}", e);
    }
    if let Err(e) = output::write_json("stacked_bars.json", &charts.stacked_bars) {
        eprintln!("Write error: {}", e);
    }
    println!(
        "Drug distribution: {} country/drug-group rows, {} bars (country_drug.json, stacked_bars.json)\n",
        format_int(charts.country_drug.len() as i64),
        format_int(charts.stacked_bars.len() as i64)
    );

    if let Err(e) = output::write_json("trafficking_flow.json", &charts.trafficking_flow) {
        eprintln!("Write error: {}", e);
    }
    println!(
        "Trafficking flow: {} nodes, {} links (trafficking_flow.json)\n",
        format_int(charts.trafficking_flow.nodes.len() as i64),
        format_int(charts.trafficking_flow.links.len() as i64)
    );

    if let Err(e) = output::write_csv("seizure_years.csv", &charts.seizure_years) {
        eprintln!("Write error: {}", e);
    }
    println!("Seizure quantity by year (seizure_years.csv)");
    output::preview_table_rows(&charts.seizure_years, 5);

    if let Err(e) = output::write_csv("prevalence_years.csv", &charts.prevalence_years) {
        eprintln!("Write error: {}", e);
    }

    if let Err(e) = output::write_csv("prices.csv", &charts.prices) {
        eprintln!("Write error: {}", e);
    }
    println!("Price band points (prices.csv)");
    output::preview_table_rows(&charts.prices, 3);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    loop {
        println!("Global Drug Use Dashboard data pipeline");
        println!("[1] Load the datasets");
        println!("[2] Generate chart data\n");
        match read_line("Enter choice: ").as_str() {
            "1" => {
                handle_load();
            }
            "2" => {
                println!();
                handle_generate_chart_data();
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            _ => {
                println!("Invalid choice. Please enter 1 or 2.\n");
            }
        }
    }
}
