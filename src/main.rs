use std::process::ExitCode;

fn main() -> ExitCode {
    youtube_bulk_downloader_lib::run()
}
