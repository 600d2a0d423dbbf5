use scene_cli::{build_cli, init_logging, run};

fn main() {
    let matches = build_cli().get_matches();
    let level = matches
        .get_one::<String>("log-level")
        .map_or("warn", String::as_str);
    init_logging(level);

    match run(&matches) {
        Ok(output) => println!("{output}"),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}
