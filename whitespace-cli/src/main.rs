use clap::Parser;
use std::io::Read;
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use whitespace::parser::{self, ParsingResult};
use whitespace::token::expand_notation;
use whitespace::vm::{self, VMOptions};

/// Run a Whitespace program.
#[derive(Parser, Debug)]
#[command(name = "whitespace")]
struct Args {
    /// File containing a Whitespace program.
    #[arg()]
    file: String,
    /// Input for the program, each argument is one line.
    #[arg()]
    input: Vec<String>,
    /// Read the program's input from standard input instead.
    #[arg(long, conflicts_with = "input")]
    stdin: bool,
    /// The file uses the S/T/N letter notation.
    #[arg(long, short = 'n')]
    notation: bool,
    /// A limit for the number of executed operations.
    /// If the limit is reached, the program will be stopped with an error.
    #[arg(long, short = 'l')]
    op_limit: Option<u64>,
    /// Print the parsed instructions instead of running the program.
    #[arg(long)]
    list: bool,
    /// Print statistics after running the program.
    #[arg(long, short = 's')]
    stats: bool,
}

fn read_program_from_file(file: &str, notation: bool) -> Result<String, anyhow::Error> {
    let source = std::fs::read_to_string(file)?;
    Ok(if notation { expand_notation(&source) } else { source })
}

fn read_input(args: &Args) -> Result<String, anyhow::Error> {
    if args.stdin {
        let mut input = String::new();
        std::io::stdin().lock().read_to_string(&mut input)?;
        return Ok(input);
    }
    Ok(args.input.iter().map(|line| format!("{line}\n")).collect())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<ExitCode> {
    init_logging();
    let args = Args::parse();

    let source = read_program_from_file(&args.file, args.notation)?;
    let input = read_input(&args)?;

    let program = match parser::parse_program(&source) {
        Ok(program) => program,
        Err(error) => {
            println!("~~~COMPILATION ERROR~~~");
            println!("{error}");
            return Ok(ExitCode::from(2));
        }
    };
    info!(file = %args.file, instructions = program.len(), "parsed");

    if args.list {
        print_listing(&program);
        return Ok(ExitCode::SUCCESS);
    }

    let options = match args.op_limit {
        Some(limit) => VMOptions::new(limit),
        None => VMOptions::default(),
    };

    let start_time = std::time::Instant::now();
    let result = vm::run(&program, &input, options);
    let elapsed = start_time.elapsed();

    match result {
        Ok(result) => {
            if args.stats {
                print_stats(result.instruction_counter, elapsed);
            }
            println!("~~~~~RESULT~~~~~");
            println!("{}", result.output);
            Ok(ExitCode::SUCCESS)
        }
        Err(error) => {
            println!("~~~RUNTIME EXCEPTION~~~");
            println!("{error}");
            Ok(ExitCode::from(3))
        }
    }
}

fn print_listing(program: &ParsingResult) {
    for (index, instruction) in program.instructions().iter().enumerate() {
        println!("{index:>5} {instruction}");
    }
}

/// `12.3M`, `4.5k` or plain.
fn human_rate(per_second: f64) -> String {
    [(1e9, "G"), (1e6, "M"), (1e3, "k")]
        .iter()
        .find(|(scale, _)| per_second >= *scale)
        .map_or_else(|| format!("{per_second:.1}"), |(scale, suffix)| format!("{:.1}{suffix}", per_second / scale))
}

fn print_stats(instruction_counter: u64, elapsed: Duration) {
    let seconds = elapsed.as_secs_f64();
    let rate = if seconds > 0.0 { human_rate(instruction_counter as f64 / seconds) } else { "-".to_string() };
    eprintln!("ran {instruction_counter} instructions in {elapsed:?} ({rate} instructions/s)");
}
