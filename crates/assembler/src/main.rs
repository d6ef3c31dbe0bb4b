//! CLI entry point for the `sicxe` assembler and runner.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::LevelFilter;
use sicxe_assembler::assembler::{assemble, format_listing, AssembleResult};
use sicxe_core::{
    disassemble_instruction, disassemble_range, BufferedDevices, CancellationToken, CoreConfig,
    EngineState, Machine, ObjectFile, TraceEvent, DEFAULT_CAPACITY_WORDS,
};
use simple_logger::SimpleLogger;
#[cfg(test)]
use tempfile as _;

const USAGE_TEXT: &str = "\
Usage: sicxe <command> [options]

Commands:
  build  <input> [-o <output>] [--verbose]   Assemble source to an object program
  run    <input> [options]                   Assemble or load, then execute
  disasm <input>                             Disassemble a source or object program

Run options:
  --capacity <words>   Memory size in words (default: 1000)
  --max-steps <n>      Stop after n instructions
  --snapshot <file>    Save memory to <file> after the run

Options:
  -o, --output <file>  Output file path (default: input stem + .obj)
  -v, --verbose        Print listing (build) or instruction trace (run) to stderr
  -h, --help           Show this help message

Inputs ending in .obj are read as object programs; anything else is assembled.

Examples:
  sicxe build copy.asm
  sicxe run copy.asm --max-steps 10000
  sicxe run copy.obj --snapshot memory.txt
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Build(BuildArgs),
    Run(RunArgs),
    Disasm(PathBuf),
}

#[derive(Debug, PartialEq, Eq)]
struct BuildArgs {
    input: PathBuf,
    output: Option<PathBuf>,
    verbose: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct RunArgs {
    input: PathBuf,
    capacity: usize,
    max_steps: Option<u64>,
    snapshot: Option<PathBuf>,
    verbose: bool,
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();

    match command_str.as_str() {
        "build" => parse_build_args(args)
            .map(Command::Build)
            .map(ParseResult::Command),
        "run" => parse_run_args(args)
            .map(Command::Run)
            .map(ParseResult::Command),
        "disasm" => parse_single_input(args)
            .map(Command::Disasm)
            .map(ParseResult::Command),
        other => Err(format!("unknown command: {other}")),
    }
}

fn take_value(
    flag: &OsString,
    args: &mut impl Iterator<Item = OsString>,
) -> Result<OsString, String> {
    args.next()
        .ok_or_else(|| format!("missing value for {}", flag.to_string_lossy()))
}

fn set_input(input: &mut Option<PathBuf>, arg: OsString) -> Result<(), String> {
    if arg.to_string_lossy().starts_with('-') {
        return Err(format!("unknown option: {}", arg.to_string_lossy()));
    }
    if input.is_some() {
        return Err("multiple input paths provided".to_string());
    }
    *input = Some(PathBuf::from(arg));
    Ok(())
}

#[allow(clippy::while_let_on_iterator)]
fn parse_build_args(mut args: impl Iterator<Item = OsString>) -> Result<BuildArgs, String> {
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut verbose = false;

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "--verbose" || arg == "-v" {
            verbose = true;
            continue;
        }

        if arg == "-o" || arg == "--output" {
            output = Some(PathBuf::from(take_value(&arg, &mut args)?));
            continue;
        }

        set_input(&mut input, arg)?;
    }

    let input = input.ok_or_else(|| "missing input path".to_string())?;
    Ok(BuildArgs {
        input,
        output,
        verbose,
    })
}

#[allow(clippy::while_let_on_iterator)]
fn parse_run_args(mut args: impl Iterator<Item = OsString>) -> Result<RunArgs, String> {
    let mut input: Option<PathBuf> = None;
    let mut capacity = DEFAULT_CAPACITY_WORDS;
    let mut max_steps = None;
    let mut snapshot = None;
    let mut verbose = false;

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "--verbose" || arg == "-v" {
            verbose = true;
            continue;
        }

        if arg == "--capacity" {
            let value = take_value(&arg, &mut args)?;
            capacity = value
                .to_string_lossy()
                .parse()
                .ok()
                .filter(|words| *words > 0)
                .ok_or_else(|| format!("invalid capacity: {}", value.to_string_lossy()))?;
            continue;
        }

        if arg == "--max-steps" {
            let value = take_value(&arg, &mut args)?;
            max_steps = Some(
                value
                    .to_string_lossy()
                    .parse()
                    .map_err(|_| format!("invalid step count: {}", value.to_string_lossy()))?,
            );
            continue;
        }

        if arg == "--snapshot" {
            snapshot = Some(PathBuf::from(take_value(&arg, &mut args)?));
            continue;
        }

        set_input(&mut input, arg)?;
    }

    let input = input.ok_or_else(|| "missing input path".to_string())?;
    Ok(RunArgs {
        input,
        capacity,
        max_steps,
        snapshot,
        verbose,
    })
}

fn parse_single_input(args: impl Iterator<Item = OsString>) -> Result<PathBuf, String> {
    let mut input: Option<PathBuf> = None;

    for arg in args {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }
        set_input(&mut input, arg)?;
    }

    input.ok_or_else(|| "missing input path".to_string())
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("out");

    let parent = input.parent().unwrap_or_else(|| Path::new(""));

    parent.join(format!("{stem}.obj"))
}

fn is_object_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("obj"))
}

fn assemble_or_report(input: &Path) -> Result<AssembleResult, i32> {
    assemble(input).map_err(|e| {
        eprintln!("{}", e.format_for_stderr());
        1
    })
}

fn load_program(input: &Path) -> Result<ObjectFile, i32> {
    if is_object_path(input) {
        ObjectFile::read_from_path(input).map_err(|e| {
            eprintln!("{}: error: {e}", input.display());
            1
        })
    } else {
        assemble_or_report(input).map(|result| result.object)
    }
}

fn run_build(args: BuildArgs) -> Result<(), i32> {
    let result = assemble_or_report(&args.input)?;

    let output_path = args
        .output
        .unwrap_or_else(|| default_output_path(&args.input));

    if let Err(e) = result.object.write_to_path(&output_path) {
        eprintln!("error: failed to write output: {e}");
        return Err(1);
    }

    if args.verbose {
        eprintln!("{}", format_listing(&result.listing));
    }

    println!(
        "Assembled {} ({} bytes) -> {}",
        args.input.display(),
        result.object.program_length(),
        output_path.display()
    );

    Ok(())
}

fn run_program(args: &RunArgs) -> Result<(), i32> {
    let object = load_program(&args.input)?;

    let config = CoreConfig {
        capacity: args.capacity,
        tracing_enabled: args.verbose,
        step_limit: args.max_steps,
    };
    let mut machine = Machine::with_devices(config, BufferedDevices::new()).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    if let Err(e) = machine.load(&object) {
        eprintln!("{}: error: {e}", args.input.display());
        return Err(1);
    }

    if args.verbose {
        machine.set_trace_sink(Box::new(|event: TraceEvent| match event {
            TraceEvent::InstructionStart { pc, instruction } => {
                eprintln!("{pc:06X}  {}", disassemble_instruction(pc, &instruction));
            }
            TraceEvent::FaultRaised { pc, fault } => {
                eprintln!("{pc:06X}  fault: {fault}");
            }
            TraceEvent::InstructionRetired { .. } | TraceEvent::MemoryWrite { .. } => {}
        }));
    }

    let state = machine.run(&CancellationToken::new());

    for (device, bytes) in machine.devices().outputs() {
        println!("device {device:02X}: {}", String::from_utf8_lossy(bytes));
    }
    println!("{state} after {} steps", machine.retired_steps());
    println!("{}", machine.registers());

    if let Some(path) = &args.snapshot {
        if let Err(e) = machine.save_memory_snapshot(path) {
            eprintln!("error: {e}");
            return Err(1);
        }
    }

    match state {
        EngineState::Faulted(fault) => {
            eprintln!(
                "{}: error: fault at {:06X}: {fault}",
                args.input.display(),
                machine.registers().pc()
            );
            Err(1)
        }
        _ => Ok(()),
    }
}

fn run_disasm(input: &Path) -> Result<(), i32> {
    let object = load_program(input)?;
    let mut machine = Machine::new(CoreConfig {
        capacity: (object.end_address() as usize).div_ceil(3).max(1),
        ..CoreConfig::default()
    })
    .map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    if let Err(e) = machine.load(&object) {
        eprintln!("{}: error: {e}", input.display());
        return Err(1);
    }

    for row in disassemble_range(machine.memory(), object.start_address(), object.end_address()) {
        println!("{:06X}  {row}", row.address);
    }
    Ok(())
}

fn main() {
    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(command)) => {
            let verbose = match &command {
                Command::Build(args) => args.verbose,
                Command::Run(args) => args.verbose,
                Command::Disasm(_) => false,
            };
            let level = if verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Warn
            };
            if let Err(e) = SimpleLogger::new().with_level(level).init() {
                eprintln!("warning: logger unavailable: {e}");
            }

            let result = match command {
                Command::Build(args) => run_build(args),
                Command::Run(args) => run_program(&args),
                Command::Disasm(input) => run_disasm(&input),
            };
            result.err().unwrap_or(0)
        }
        Err(error) => {
            if error.starts_with("Usage:") {
                println!("{error}");
            } else {
                eprintln!("error: {error}");
                eprintln!("{USAGE_TEXT}");
            }
            1
        }
    };

    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::path::PathBuf;

    fn os(args: &[&str]) -> impl Iterator<Item = OsString> {
        args.iter()
            .map(OsString::from)
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn parses_build_command() {
        let result = parse_build_args(os(&["copy.asm", "-o", "out.obj", "--verbose"]))
            .expect("valid build args should parse");

        assert_eq!(
            result,
            BuildArgs {
                input: PathBuf::from("copy.asm"),
                output: Some(PathBuf::from("out.obj")),
                verbose: true,
            }
        );
    }

    #[test]
    fn parses_run_command() {
        let result = parse_run_args(os(&[
            "copy.obj",
            "--capacity",
            "4096",
            "--max-steps",
            "500",
            "--snapshot",
            "mem.txt",
        ]))
        .expect("valid run args should parse");

        assert_eq!(
            result,
            RunArgs {
                input: PathBuf::from("copy.obj"),
                capacity: 4096,
                max_steps: Some(500),
                snapshot: Some(PathBuf::from("mem.txt")),
                verbose: false,
            }
        );
    }

    #[test]
    fn run_defaults() {
        let result = parse_run_args(os(&["p.asm"])).unwrap();
        assert_eq!(result.capacity, DEFAULT_CAPACITY_WORDS);
        assert_eq!(result.max_steps, None);
    }

    #[test]
    fn rejects_bad_run_values() {
        let error = parse_run_args(os(&["p.asm", "--capacity", "0"])).unwrap_err();
        assert!(error.contains("invalid capacity"));
        let error = parse_run_args(os(&["p.asm", "--max-steps", "lots"])).unwrap_err();
        assert!(error.contains("invalid step count"));
        let error = parse_run_args(os(&["p.asm", "--snapshot"])).unwrap_err();
        assert!(error.contains("missing value for --snapshot"));
    }

    #[test]
    fn parses_help_flag() {
        let result = parse_args(os(&["--help"])).expect("help should parse without error");
        assert!(matches!(result, ParseResult::Help));
    }

    #[test]
    fn parses_disasm_command() {
        let result = parse_args(os(&["disasm", "copy.obj"])).unwrap();
        assert!(matches!(
            result,
            ParseResult::Command(Command::Disasm(path)) if path == PathBuf::from("copy.obj")
        ));
    }

    #[test]
    fn rejects_unknown_command() {
        let error = parse_args(os(&["unknown"])).expect_err("unknown command should fail parse");
        assert!(error.contains("unknown command"));
    }

    #[test]
    fn default_output_path_replaces_extension() {
        assert_eq!(
            default_output_path(&PathBuf::from("src/copy.asm")),
            PathBuf::from("src/copy.obj")
        );
        assert_eq!(
            default_output_path(&PathBuf::from("program")),
            PathBuf::from("program.obj")
        );
    }

    #[test]
    fn object_inputs_are_detected_by_extension() {
        assert!(is_object_path(Path::new("copy.obj")));
        assert!(is_object_path(Path::new("COPY.OBJ")));
        assert!(!is_object_path(Path::new("copy.asm")));
    }

    #[test]
    fn parse_build_missing_input() {
        let error = parse_build_args(std::iter::empty()).expect_err("missing input should fail");
        assert!(error.contains("missing input"));
    }

    #[test]
    fn rejects_unknown_option() {
        let error = parse_run_args(os(&["--fast"])).expect_err("unknown option should fail");
        assert!(error.contains("unknown option"));
    }
}
