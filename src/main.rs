fn main() {
    if let Err(err) = maniva_survey::run() {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}
