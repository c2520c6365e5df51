use std::{io::Write, process::ExitCode};

use lembar::{
    art::welcome_message,
    executor::scan::{ScanIterator, Scanner},
    storage::{storage_manager::StorageManager, table_view::TableView},
    types::{
        error::DatabaseError,
        row::Row,
        value::{DataType, Value},
    },
};
use rustyline::{DefaultEditor, error::ReadlineError};
use tracing_subscriber::EnvFilter;

const DEFAULT_SCAN_LIMIT: usize = 20;

fn print_help() {
    println!(
        r#"
Available commands:
  .tables                          - List tables
  .schema <table>                  - Show the columns of a table
  .scan <table> [limit]            - Print rows in clustered order
  .find <table> <column> <value>   - Print rows whose column equals value
  .pages <table>                   - Show the data page chain and main index
  help, h                          - Show this help message
  clear                            - Clear the screen
  exit, quit, q                    - Exit the inspector

Use Up/Down arrows to navigate command history.
"#
    );
}

fn format_row(row: &Row) -> String {
    row.values
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(" | ")
}

fn parse_value(data_type: DataType, text: &str) -> Result<Value, DatabaseError> {
    if text.eq_ignore_ascii_case("null") {
        return Ok(Value::Null);
    }
    let mismatch = || DatabaseError::TypeMismatch {
        expected: data_type.to_string(),
        actual: text.to_string(),
    };
    match data_type {
        DataType::Int => text.parse::<i64>().map(Value::Integer).map_err(|_| mismatch()),
        DataType::Float => text.parse::<f64>().map(Value::Float).map_err(|_| mismatch()),
        DataType::FixedChar => Ok(Value::FixedChar(text.to_string())),
        DataType::VarChar => Err(DatabaseError::UnsupportedType(data_type.to_string())),
    }
}

fn show_tables(storage: &StorageManager) -> Result<(), DatabaseError> {
    let names = storage.table_names()?;
    if names.is_empty() {
        println!("(no tables)");
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

fn show_schema(storage: &StorageManager, table_name: &str) -> Result<(), DatabaseError> {
    let view = storage.open_table(table_name)?;
    let meta = view.meta();
    for (field_id, (name, field)) in meta
        .column_names
        .iter()
        .zip(view.column_metas())
        .enumerate()
    {
        let mut flags = Vec::new();
        if field_id == meta.cluster_field_id() {
            flags.push("CLUSTERED");
        }
        if !field.nullable {
            flags.push("NOT NULL");
        }
        if field.unique {
            flags.push("UNIQUE");
        }
        println!(
            "{:>3}  {:<16} {}({}) {}",
            field_id,
            name,
            field.data_type,
            field.width,
            flags.join(" ")
        );
    }
    Ok(())
}

fn scan_table(
    storage: &StorageManager,
    table_name: &str,
    limit: usize,
) -> Result<(), DatabaseError> {
    let mut view = storage.open_table(table_name)?;
    Scanner::reset(&mut view)?;
    println!("{}", view.column_names().join(" | "));
    let mut printed = 0;
    for row in ScanIterator::new(view).take(limit) {
        println!("{}", format_row(&row?));
        printed += 1;
    }
    println!("({} rows)", printed);
    Ok(())
}

fn find_rows(
    storage: &StorageManager,
    table_name: &str,
    column: &str,
    text: &str,
) -> Result<(), DatabaseError> {
    let mut view = storage.open_table(table_name)?;
    let field_id = view
        .meta()
        .column_names
        .iter()
        .position(|name| name == column)
        .ok_or_else(|| DatabaseError::InvalidSchema {
            reason: format!("table {} has no column {}", table_name, column),
        })?;
    let key = parse_value(view.column_metas()[field_id].data_type, text)?;
    let rows = view.search(field_id, &key)?;
    println!("{}", view.column_names().join(" | "));
    for row in &rows {
        println!("{}", format_row(row));
    }
    println!("({} rows)", rows.len());
    Ok(())
}

fn show_pages(storage: &StorageManager, table_name: &str) -> Result<(), DatabaseError> {
    let mut view: TableView = storage.open_table(table_name)?;
    println!("meta page {}", view.meta().page_number);
    for (page_number, rows) in view.data_pages()? {
        println!("  data page {:>6}  {:>4} rows", page_number, rows);
    }
    for entry in view.index_entries()? {
        println!("  index {:>20} -> {}", entry.key, entry.page_number);
    }
    Ok(())
}

fn process_command(storage: &StorageManager, command: &str) -> bool {
    let parts: Vec<&str> = command.split_whitespace().collect();
    let result = match parts.as_slice() {
        [] => Ok(()),
        ["exit" | "quit" | "q"] => {
            println!("Goodbye!");
            return false;
        }
        ["help" | "h"] => {
            print_help();
            Ok(())
        }
        ["clear"] => {
            print!("\x1B[2J\x1B[1;1H");
            let _ = std::io::stdout().flush();
            Ok(())
        }
        [".tables"] => show_tables(storage),
        [".schema", table] => show_schema(storage, table),
        [".scan", table] => scan_table(storage, table, DEFAULT_SCAN_LIMIT),
        [".scan", table, limit] => match limit.parse::<usize>() {
            Ok(limit) => scan_table(storage, table, limit),
            Err(_) => {
                println!("limit must be a number, got {}", limit);
                Ok(())
            }
        },
        [".find", table, column, value @ ..] if !value.is_empty() => {
            find_rows(storage, table, column, &value.join(" "))
        }
        [".pages", table] => show_pages(storage, table),
        _ => {
            println!("Unknown command: {}. Type 'help' for usage.", command.trim());
            Ok(())
        }
    };
    if let Err(e) = result {
        println!("Error: {}", e);
    }
    true
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: lembar <database-file>");
        return ExitCode::FAILURE;
    };

    let storage = match StorageManager::open_read_only(&path) {
        Ok(storage) => storage,
        Err(e) => {
            eprintln!("cannot open {}: {}", path, e);
            return ExitCode::FAILURE;
        }
    };

    println!("{}", welcome_message("LEMBAR"));

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("cannot start line editor: {}", e);
            return ExitCode::FAILURE;
        }
    };

    loop {
        match rl.readline("lembar> ") {
            Ok(line) => {
                let command = line.trim().to_string();
                if !command.is_empty() {
                    let _ = rl.add_history_entry(&command);
                }
                if !process_command(&storage, &command) {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Interrupted");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("EOF");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    storage.abort();
    ExitCode::SUCCESS
}
