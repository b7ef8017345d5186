use clap::{Parser, ValueEnum};
use colored::Colorize;
use fngraph::prelude::*;
use itertools::Itertools;
use log::info;
use std::error::Error;
use std::process;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum InputType {
    Scalar,
    Vector,
    SymmetricTensor,
    Tensor,
    Array,
}

impl From<InputType> for IoKind {
    fn from(value: InputType) -> Self {
        match value {
            InputType::Scalar => IoKind::Scalar,
            InputType::Vector => IoKind::Vector,
            InputType::SymmetricTensor => IoKind::SymmetricTensor,
            InputType::Tensor => IoKind::Tensor,
            InputType::Array => IoKind::Array,
        }
    }
}

#[derive(Parser)]
#[command(name = "fngraph-eval")]
#[command(about = "Evaluate a mathematical expression at one or more points")]
#[command(version)]
struct Args {
    /// Expression to evaluate, e.g. "sin(x) * y + 1"
    expression: String,

    /// Evaluation point as comma separated coordinates; repeat for several points
    #[arg(short, long = "point", value_name = "X,Y,..")]
    points: Vec<String>,

    /// Variable names in coordinate order (default: alphabetical)
    #[arg(long, value_delimiter = ',')]
    vars: Option<Vec<String>>,

    /// Declared kind of every point
    #[arg(long, value_enum)]
    input_type: Option<InputType>,

    /// Fail on divide by zero, invalid, overflow or underflow instead of returning inf/NaN
    #[arg(long)]
    safe: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("  {}: {}", "caused by".red(), cause);
            source = cause.source();
        }
        process::exit(1);
    }
}

fn parse_point(text: &str) -> Result<Vec<f64>, Box<dyn Error>> {
    text.split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .map_err(|e| -> Box<dyn Error> {
                    format!("invalid coordinate '{}' in point '{text}': {e}", v.trim()).into()
                })
        })
        .collect()
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let function = match &args.vars {
        Some(vars) => {
            let vars: Vec<&str> = vars.iter().map(String::as_str).collect();
            Function::parse_with_vars(&args.expression, &vars)?
        }
        None => Function::parse(&args.expression)?,
    };
    let function = if args.safe {
        safe_maths(function)
    } else {
        function
    };
    println!("{}: {}", "Function".cyan(), function);

    if args.points.is_empty() {
        return Ok(());
    }
    let points = args
        .points
        .iter()
        .map(|p| parse_point(p))
        .collect::<Result<Vec<_>, _>>()?;
    info!("evaluating at {} point(s)", points.len());

    let query = Query::new(&function);
    let query = match args.input_type {
        Some(kind) => query.with_input_type(kind.into()),
        None => query,
    };
    let results = query.evaluate(points.clone())?;

    if let Some(descriptor) = results.descriptor() {
        println!("{}: {}", "Output".cyan(), descriptor);
    }
    for (point, row) in points.iter().zip(results.values().rows()) {
        let value = match results.dtype() {
            Some(DataType::Bool) => row.iter().map(|v| *v != 0.0).join(", "),
            _ => row.iter().join(", "),
        };
        println!("  ({}) -> {}", point.iter().join(", "), value.as_str().green());
    }
    Ok(())
}
