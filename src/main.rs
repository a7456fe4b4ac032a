use std::{env, process};

use ignite::bytecode::disasm::print_bytecode_array;
use ignite::bytecode::{BytecodeArray, BytecodeArrayBuilder, Token};
use ignite::config::EngineConfig;
use ignite::lang::name::{Name, NameTable};
use ignite::lang::scope::{FunctionKind, LanguageMode, Scope, VariableMode};
use ignite::lang::value::Object;
use ignite::runtime::Interpreter;
use ignite::scope_info::ScopeInfo;
use ignite::snapshot::FunctionSnapshot;

const DEMO_SOURCE: &str = "function f(a) { var b = 1; return a + b; }";

fn main() {
    let args: Vec<String> = env::args().collect();

    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            process::exit(1);
        }
    };
    if options.help {
        print_usage();
        return;
    }

    let CliOptions {
        show_scope,
        show_bytecode,
        via_snapshot,
        config,
        argument,
        ..
    } = options;

    let names = NameTable::new();
    let (scope_info, mut bytecode) = compile_demo(&names);

    if show_scope {
        scope_info.print();
        let cache = config.build_context_slot_cache();
        for local in ["a", "b"] {
            let name = names.intern(local);
            let slot = scope_info.context_slot_index(&name, cache.as_ref());
            println!(
                "{}: parameter {:?}, stack slot {:?}, context slot {:?}",
                local,
                scope_info.parameter_index(&name),
                scope_info.stack_slot_index(&name),
                slot.map(|s| s.index)
            );
        }
        println!();
    }

    if via_snapshot {
        let snapshot = FunctionSnapshot::new(scope_info, bytecode);
        let loaded = snapshot
            .to_bytes()
            .and_then(|bytes| FunctionSnapshot::from_bytes(&bytes, &names));
        match loaded {
            Ok(loaded) => bytecode = loaded.bytecode,
            Err(e) => {
                eprintln!("{}", e);
                process::exit(1);
            }
        }
    }

    if show_bytecode {
        print_bytecode_array("f", &bytecode);
        println!();
    }

    let mut interpreter = Interpreter::with_config(config.interpreter.clone());
    match interpreter.run(&bytecode, Object::Undefined, &[argument]) {
        Ok(result) => println!("{}", result),
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}

fn print_usage() {
    println!("IGNITE - scope descriptors and register bytecode");
    println!();
    println!("Compiles and runs: {}", DEMO_SOURCE);
    println!();
    println!("Usage:");
    println!("  ignite [value]            Call f(value), default 5");
    println!("  ignite --scope            Show the scope info of f");
    println!("  ignite --bc               Show the bytecode of f");
    println!("  ignite --snapshot         Round-trip f through a postcard snapshot first");
    println!("  ignite --no-cache         Disable the context slot cache");
    println!("  ignite --max-steps N      Stop after N instructions");
    println!("  ignite --help, -h         Show this help");
}

#[derive(Debug)]
struct CliOptions {
    help: bool,
    show_scope: bool,
    show_bytecode: bool,
    via_snapshot: bool,
    config: EngineConfig,
    argument: Object,
}

/// Splits the command line into flags and the argument to `f`. A `-`-prefixed
/// word that parses as a number is the argument, not a flag.
fn parse_args(args: &[String]) -> Result<CliOptions, String> {
    let mut options = CliOptions {
        help: false,
        show_scope: false,
        show_bytecode: false,
        via_snapshot: false,
        config: EngineConfig::default(),
        argument: Object::Smi(5),
    };
    let mut positional: Option<&str> = None;

    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--help" | "-h" => options.help = true,
            "--scope" => options.show_scope = true,
            "--bc" => options.show_bytecode = true,
            "--snapshot" => options.via_snapshot = true,
            "--no-cache" => options.config.context_slot_cache.enabled = false,
            "--max-steps" => match rest.next().map(|v| v.parse::<usize>()) {
                Some(Ok(max)) => options.config.interpreter.max_steps = Some(max),
                _ => return Err("--max-steps expects a number".to_string()),
            },
            flag if flag.starts_with('-') && !is_negative_number(flag) => {
                return Err(format!("unknown flag '{}'", flag));
            }
            value => {
                if let Some(first) = positional {
                    return Err(format!("unexpected argument '{}' after '{}'", value, first));
                }
                positional = Some(value);
            }
        }
    }

    if let Some(text) = positional {
        options.argument = parse_argument(text);
    }
    Ok(options)
}

fn is_negative_number(word: &str) -> bool {
    word.strip_prefix('-')
        .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit() || c == '.'))
        && word.parse::<f64>().is_ok()
}

fn parse_argument(text: &str) -> Object {
    if let Ok(v) = text.parse::<i32>() {
        Object::Smi(v)
    } else if let Ok(v) = text.parse::<f64>() {
        Object::number(v)
    } else {
        Object::string(Name::new_uninterned(text))
    }
}

/// Hand-lowered `function f(a) { var b = 1; return a + b; }`.
fn compile_demo(names: &NameTable) -> (ScopeInfo, BytecodeArray) {
    let mut scope = Scope::new_function(FunctionKind::NormalFunction);
    scope.declare_this(names.this_string());
    let a = scope.declare_parameter(names.intern("a"));
    let b = scope.declare_local(names.intern("b"), VariableMode::Var);
    let locals = scope.allocate_variables(0);
    let scope_info = ScopeInfo::create(&scope);

    let mut builder = BytecodeArrayBuilder::new();
    builder
        .set_parameter_count(scope.num_parameters() + 1)
        .set_locals_count(locals as usize);
    let a = builder.variable_register(scope.variable(a));
    let b = builder.variable_register(scope.variable(b));
    builder
        .load_literal(Object::Smi(1))
        .store_accumulator_in_register(b)
        .load_accumulator_with_register(a)
        .binary_operation(Token::Add, b, LanguageMode::Sloppy)
        .ret();

    (scope_info, builder.to_bytecode_array())
}
