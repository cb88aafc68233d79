extern crate clap;
extern crate env_logger;
extern crate mfrg;

use std::error::Error;
use std::path::Path;
use std::process;
use mfrg::config::FrgConf;
use mfrg::state::State;
use mfrg::{flow, io, susceptibility};

fn load_conf(matches: &clap::ArgMatches) -> Result<FrgConf, Box<dyn Error>> {
    let conf = match matches.value_of("config") {
        Some(path) => FrgConf::load(path)?,
        None => FrgConf::default(),
    };
    println!("# configuration");
    print!("{}", conf.to_yaml()?);
    Ok(conf)
}

fn print_susceptibilities(state: &State) -> Result<(), Box<dyn Error>> {
    println!("susceptibilities:");
    for chi in susceptibility::compute(state)? {
        print!("{}", chi);
    }
    Ok(())
}

/// `out.bin.gz` at `Λ = 2.5` becomes `out.lambda2.5.bin.gz`.
fn checkpoint_path(output: &str, lambda: f64) -> Result<String, Box<dyn Error>> {
    let (stem, ext) = io::split_extension(Path::new(output))?;
    let (stem, inner) = io::split_extension(Path::new(stem))?;
    Ok(format!("{}.lambda{}{}{}", stem, lambda, inner, ext))
}

fn run_flow(matches: &clap::ArgMatches) -> Result<(), Box<dyn Error>> {
    let conf = load_conf(matches)?;
    flow::self_check(&conf)?;
    let initial = match matches.value_of("resume") {
        Some(path) => {
            let mut state = io::load_state(Path::new(path))?;
            let mut conf = conf.clone();
            conf.lambda_ini = state.lambda;
            conf.validate()?;
            state.conf = conf;
            state
        }
        None => flow::initial_state(&conf)?,
    };
    println!("flow:");
    println!("- {}", initial.summary());
    let mut run = flow::Run::new(initial)?;
    let output = matches.value_of("output");
    let report = run.do_run(|state, passed| {
        println!("- {}", state.summary());
        for lambda in passed {
            println!("- {{checkpoint: {}}}", lambda);
            if let Some(path) = output {
                let path = checkpoint_path(path, *lambda)
                    .map_err(|e| flow::Error::Observer(e.to_string()))?;
                io::save_state(Path::new(&path), state)
                    .map_err(|e| flow::Error::Observer(e.to_string()))?;
            }
        }
        Ok(())
    })?;
    println!("report:");
    println!("{}", report);
    let state = run.into_state();
    if matches.is_present("susceptibility") {
        print_susceptibilities(&state)?;
    }
    if let Some(path) = matches.value_of("output") {
        io::save_state(Path::new(path), &state)?;
        println!("# snapshot written to {}", path);
    }
    Ok(())
}

fn run_parquet(matches: &clap::ArgMatches) -> Result<(), Box<dyn Error>> {
    let conf = load_conf(matches)?;
    flow::self_check(&conf)?;
    let (state, convergence) = flow::solve_parquet(&conf)?;
    println!("parquet:");
    println!("- {{converged: {}, iterations: {}, residual: {:e}}}",
             convergence.is_converged(), convergence.iterations(),
             convergence.residual());
    println!("- {}", state.summary());
    if matches.is_present("susceptibility") {
        print_susceptibilities(&state)?;
    }
    if let Some(path) = matches.value_of("output") {
        io::save_state(Path::new(path), &state)?;
        println!("# snapshot written to {}", path);
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let common = "[--config=<config>] 'YAML configuration file'
                  [--output=<output>] 'Snapshot of the final state (.gz, .xz or plain)'
                  [--susceptibility] 'Print channel susceptibilities of the final state'";
    let matches = clap::App::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .setting(clap::AppSettings::SubcommandRequiredElseHelp)
        .subcommand(clap::SubCommand::with_name("flow")
                    .about("Integrate the mfRG flow from lambda_ini to lambda_fin")
                    .args_from_usage(common)
                    .args_from_usage("[--resume=<resume>] 'Start from a snapshot'"))
        .subcommand(clap::SubCommand::with_name("parquet")
                    .about("Solve the parquet equations at lambda_ini")
                    .args_from_usage(common))
        .get_matches();
    let result = match matches.subcommand() {
        ("flow", Some(m)) => run_flow(m),
        ("parquet", Some(m)) => run_parquet(m),
        _ => Ok(()),
    };
    if let Err(e) = result {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
