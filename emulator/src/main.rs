mod host;
mod options;
mod peers;
mod retained;
mod session;
mod transcript;

use std::env;
use std::io;
use std::process;

use options::{USAGE, parse_args};
use session::Session;

fn main() -> io::Result<()> {
    let options = parse_args(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let mut session = Session::new(options)?;
    session.run()
}
