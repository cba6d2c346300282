//! Interactive shell: read a line, run it through the pipeline, print
//! the result. Errors abort the current evaluation only; the next line
//! starts over against the same base environment. Set `RUST_LOG=debug`
//! to watch each pipeline stage.

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use sexpvm::builtins::base_env;
use sexpvm::compile::eval_str_in;
use sexpvm::intern::Interner;
use sexpvm::normalize::Normalizer;
use sexpvm::printer::print;

const HISTORY_FILE: &str = ".sexpvm_history";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    println!("sexpvm - a minimal Lisp on an explicit-continuation machine");
    println!("Forms: (quote v) (f (p...) body...) (let ((v e)...) body...)");
    println!("       (if test then else?) (begin e...) (callee arg...)");
    println!("Ctrl+C or Ctrl+D exits.");
    println!();

    let mut syms = Interner::new();
    // one normalizer for the whole session keeps temporaries fresh
    // across inputs
    let mut norm = Normalizer::new();
    let env = base_env(&mut syms);

    let mut rl = DefaultEditor::new()?;
    let _ = rl.load_history(HISTORY_FILE);

    loop {
        match rl.readline("sexpvm> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                match eval_str_in(line, &mut norm, &env, &mut syms) {
                    Ok(value) => println!("{}", print(&value, &syms)),
                    Err(e) => println!("Error: {e}"),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }

    let _ = rl.save_history(HISTORY_FILE);
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .try_init();
}
