//! Binary to generate/update .expected.tmpl and .expected.err files
//!
//! Usage:
//!   cargo run --bin accept_expected            # Update all
//!   cargo run --bin accept_expected -- basic   # Update only fixtures matching "basic"

use slim_transpiler::{Options, compile_file};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

fn main() {
    let filter: Option<String> = std::env::args().nth(1);
    let fixture_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures");

    let mut updated = 0;
    let mut skipped = 0;

    for entry in WalkDir::new(&fixture_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map(|s| s == "slim").unwrap_or(false))
    {
        let path = entry.path();
        let path_str = path.to_string_lossy();

        // Partials and layouts are only compiled through the templates that use them
        if entry.file_name().to_string_lossy().starts_with('_') {
            continue;
        }

        if let Some(ref f) = filter {
            if !path_str.contains(f) {
                skipped += 1;
                continue;
            }
        }

        process_file(path);
        updated += 1;
    }

    println!("Updated {} files, skipped {}", updated, skipped);
}

fn process_file(path: &Path) {
    let is_error_test = path.components().any(|c| c.as_os_str() == "errors");

    match compile_file(path, &Options::default()) {
        Ok(result) => {
            if is_error_test {
                eprintln!("ERROR: {:?} is in errors/ but compiled successfully", path);
                return;
            }

            let expected = path.with_extension("expected.tmpl");
            if let Err(e) = fs::write(&expected, &result.code) {
                eprintln!("Failed to write {:?}: {}", expected, e);
            } else {
                println!("  wrote {}", expected.display());
            }
        }
        Err(e) => {
            if is_error_test {
                let expected_err = path.with_extension("expected.err");
                if let Err(err) = fs::write(&expected_err, format!("{}\n", e.message)) {
                    eprintln!("Failed to write {:?}: {}", expected_err, err);
                } else {
                    println!("  wrote {}", expected_err.display());
                }
            } else {
                eprintln!("ERROR: {:?} failed to compile but is not in errors/: {}", path, e);
            }
        }
    }
}
