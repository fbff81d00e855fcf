use luax::{LuaError, LuaVM, LuaValue};
use std::env;
use std::fs;
use std::io::{self, BufRead, Read, Write};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const VERSION: &str = "LuaX 5.4 (luax)";
const DIAG_PREFIX: &str = "[LuaX]:";

fn print_usage() {
    eprintln!("usage: luax [options] [script.lua|script.lx|source] [args]");
    eprintln!("Available options are:");
    eprintln!("  -e stat   execute string 'stat'");
    eprintln!("  -i        enter interactive mode after executing 'script'");
    eprintln!("  -l mod    require library 'mod' into global 'mod'");
    eprintln!("  -v        show version information");
    eprintln!("  --        stop handling options");
    eprintln!("  -         stop handling options and execute stdin");
}

#[derive(Default)]
struct Options {
    execute_strings: Vec<String>,
    interactive: bool,
    script: Option<String>,
    script_args: Vec<String>,
    require_modules: Vec<String>,
    show_version: bool,
    read_stdin: bool,
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();
    let mut opts = Options::default();
    let mut i = 1;
    let mut stop_options = false;

    while i < args.len() {
        let arg = &args[i];
        if !stop_options && arg.starts_with('-') && arg.len() > 1 {
            match arg.as_str() {
                "-e" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("'-e' needs argument".to_string());
                    }
                    opts.execute_strings.push(args[i].clone());
                }
                "-i" => opts.interactive = true,
                "-l" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("'-l' needs argument".to_string());
                    }
                    opts.require_modules.push(args[i].clone());
                }
                "-v" => opts.show_version = true,
                "--" => stop_options = true,
                _ => return Err(format!("unrecognized option '{}'", arg)),
            }
        } else if arg == "-" {
            opts.read_stdin = true;
            break;
        } else {
            opts.script = Some(arg.clone());
            opts.script_args = args[i + 1..].to_vec();
            break;
        }
        i += 1;
    }
    Ok(opts)
}

fn setup_arg_table(vm: &mut LuaVM, exe_path: &str, script_name: Option<&str>, args: &[String]) {
    let arg_table = vm.new_table();
    if let Some(t) = arg_table.as_table() {
        let mut t = t.borrow_mut();
        let exe = luax::LuaString::new(exe_path.to_string());
        let _ = t.raw_set(
            LuaValue::Integer(-1),
            LuaValue::Str(std::rc::Rc::new(exe)),
        );
        if let Some(name) = script_name {
            let s = luax::LuaString::new(name.to_string());
            let _ = t.raw_set(LuaValue::Integer(0), LuaValue::Str(std::rc::Rc::new(s)));
        }
        for (i, a) in args.iter().enumerate() {
            let s = luax::LuaString::new(a.clone());
            t.set_int(i as i64 + 1, LuaValue::Str(std::rc::Rc::new(s)));
        }
    }
    vm.set_global("arg", arg_table);
}

/// Report an uncaught error with the `[LuaX]:` prefix and source line when
/// known.
fn report_error(vm: &mut LuaVM, context: &str) {
    let msg = vm.error_message();
    match vm.error_line() {
        Some(line) => eprintln!("{} {}: {} (line {})", DIAG_PREFIX, context, msg, line),
        None => eprintln!("{} {}: {}", DIAG_PREFIX, context, msg),
    }
}

fn run_source(vm: &mut LuaVM, source: &str, chunk_name: &str) -> Result<(), i32> {
    match vm.execute_named(source, chunk_name) {
        Ok(_) => Ok(()),
        Err(LuaError::Exit) => Err(vm.exit_code()),
        Err(_) => {
            report_error(vm, chunk_name);
            Err(1)
        }
    }
}

fn execute_script(vm: &mut LuaVM, script: &str) -> Result<(), i32> {
    // a script argument is a file when it exists; a bare source literal
    // otherwise
    if std::path::Path::new(script).exists() {
        let source = match fs::read_to_string(script) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("{} cannot open {}: {}", DIAG_PREFIX, script, e);
                return Err(1);
            }
        };
        run_source(vm, &source, script)
    } else if script.ends_with(".lua") || script.ends_with(".lx") {
        eprintln!("{} cannot open {}: no such file", DIAG_PREFIX, script);
        Err(1)
    } else {
        run_source(vm, script, "command line")
    }
}

fn execute_stdin(vm: &mut LuaVM) -> Result<(), i32> {
    let mut source = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut source) {
        eprintln!("{} error reading stdin: {}", DIAG_PREFIX, e);
        return Err(1);
    }
    run_source(vm, &source, "stdin")
}

fn run_repl(vm: &mut LuaVM) -> i32 {
    println!("{}", VERSION);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        let line = match lines.next() {
            Some(Ok(line)) => line,
            _ => return 0,
        };
        let trimmed = line.trim();
        if trimmed == "exit" || trimmed == "quit" {
            return 0;
        }
        if trimmed.is_empty() {
            continue;
        }
        // try expression form first so bare expressions echo their value
        let wrapped = format!("return {}", trimmed);
        let result = match vm.execute_named(&wrapped, "repl") {
            Ok(v) => Ok(v),
            Err(_) => vm.execute_named(trimmed, "repl"),
        };
        match result {
            Ok(v) => {
                let v = v.first();
                if !v.is_nil() {
                    println!("{}", vm.display_value(&v));
                }
            }
            Err(LuaError::Exit) => return vm.exit_code(),
            Err(_) => {
                eprintln!("{} {}", DIAG_PREFIX, vm.error_message());
            }
        }
    }
}

fn main() {
    let opts = match parse_args() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("{} {}", DIAG_PREFIX, e);
            print_usage();
            std::process::exit(1);
        }
    };

    if opts.show_version {
        println!("{}", VERSION);
        if opts.execute_strings.is_empty()
            && opts.script.is_none()
            && !opts.read_stdin
            && !opts.interactive
        {
            return;
        }
    }

    let mut vm = LuaVM::new();
    if vm.open_libs().is_err() {
        eprintln!("{} failed to initialize libraries", DIAG_PREFIX);
        std::process::exit(1);
    }

    let exe_path = env::args().next().unwrap_or_else(|| "luax".to_string());
    setup_arg_table(&mut vm, &exe_path, opts.script.as_deref(), &opts.script_args);

    for module in &opts.require_modules {
        let code = format!("{} = require('{}')", module, module);
        if let Err(code_err) = run_source(&mut vm, &code, "command line") {
            std::process::exit(code_err);
        }
    }

    for code in &opts.execute_strings {
        if let Err(status) = run_source(&mut vm, code, "command line") {
            std::process::exit(status);
        }
    }

    if let Some(script) = &opts.script {
        if let Err(status) = execute_script(&mut vm, script) {
            std::process::exit(status);
        }
    } else if opts.read_stdin
        || (!opts.interactive && opts.execute_strings.is_empty() && !opts.show_version)
    {
        if let Err(status) = execute_stdin(&mut vm) {
            std::process::exit(status);
        }
    }

    if opts.interactive {
        std::process::exit(run_repl(&mut vm));
    }
}
