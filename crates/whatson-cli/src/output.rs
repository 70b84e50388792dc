use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use whatson_sync::error::AppError;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Format {
    Table,
    Json,
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => print_failure(&format!("could not render JSON: {e}")),
    }
}

pub fn print_table<T: Tabled>(items: Vec<T>) {
    let table = Table::new(items).with(Style::rounded()).to_string();
    println!("{}", table);
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_failure(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_notice(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

/// Reports an error the way the app would show it, with the technical
/// detail underneath.
pub fn print_error(err: &anyhow::Error) {
    match err.downcast_ref::<AppError>() {
        Some(AppError::ValidationFailed(messages)) => {
            for message in messages {
                print_failure(message);
            }
        }
        Some(app_err) => {
            print_failure(&app_err.user_message());
            eprintln!("  {}", app_err.to_string().dimmed());
        }
        None => print_failure(&err.to_string()),
    }
}

/// One value in full detail: JSON as-is, or as a single table row.
pub fn print_item<T, R>(item: &T, format: Format)
where
    T: Serialize,
    R: Tabled + for<'a> From<&'a T>,
{
    match format {
        Format::Json => print_json(item),
        Format::Table => print_table(vec![R::from(item)]),
    }
}

pub fn print_items<T, R>(items: &[T], format: Format)
where
    T: Serialize,
    R: Tabled + for<'a> From<&'a T>,
{
    match format {
        Format::Json => print_json(items),
        Format::Table => {
            if items.is_empty() {
                println!("No results");
            } else {
                print_table(items.iter().map(R::from).collect());
            }
        }
    }
}

pub fn display_option(o: &Option<String>) -> String {
    o.clone().unwrap_or_else(|| "-".into())
}
