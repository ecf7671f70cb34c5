fn main() {
    if let Err(err) = osm_wrangle::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
