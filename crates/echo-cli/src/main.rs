use std::{env, fs, process::ExitCode};

use echo::{Config, LogLevel, RunError};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let (path, log_level, pdb) = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = check_file(&path) {
        eprintln!("error: {err}");
        return ExitCode::FAILURE;
    }

    let config = Config::from_env_and_flags(log_level, pdb);
    match echo::entry::run_file(&path, config) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", format_uncaught(&err));
            ExitCode::FAILURE
        }
    }
}

fn parse_args(args: &[String]) -> Result<(String, LogLevel, bool), String> {
    let mut path = None;
    let mut log_level = LogLevel::Warning;
    let mut pdb = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--log_level" => {
                let value = args.get(i + 1).ok_or("--log_level requires a value")?;
                log_level = value.parse()?;
                i += 2;
            }
            "--pdb" => {
                pdb = true;
                i += 1;
            }
            other if path.is_none() => {
                path = Some(other.to_owned());
                i += 1;
            }
            other => return Err(format!("unexpected argument: {other}")),
        }
    }

    let path = path.ok_or_else(|| "usage: echo <path> [--log_level {DEBUG,INFO,WARNING}] [--pdb]".to_owned())?;
    Ok((path, log_level, pdb))
}

fn check_file(file_path: &str) -> Result<(), String> {
    match fs::metadata(file_path) {
        Ok(metadata) if metadata.is_file() => Ok(()),
        Ok(_) => Err(format!("{file_path} is not a file")),
        Err(err) => Err(format!("cannot read {file_path}: {err}")),
    }
}

/// Renders an uncaught exception the way a driver printing a real traceback
/// would: `Traceback (most recent call last): ... ExcType: message`.
fn format_uncaught(err: &RunError) -> String {
    match err {
        RunError::Exception(exc) => {
            let mut out = String::from("Traceback (most recent call last):\n");
            for frame in exc.traceback.iter().rev() {
                out.push_str(&format!("  File \"{}\", line {}, in {}\n", frame.file, frame.line, frame.func_name));
            }
            if exc.message.is_empty() {
                out.push_str(&exc.exc_type);
            } else {
                out.push_str(&format!("{}: {}", exc.exc_type, exc.message));
            }
            out
        }
        RunError::Resource(resource_err) => resource_err.into_exception().message.clone(),
    }
}
