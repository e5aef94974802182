fn main() {
    if let Err(err) = buildbench_cli::run() {
        println!("{}", err);
        std::process::exit(1);
    }
}
