fn main() {
    if let Err(err) = offi_scrape_lib::run() {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}
