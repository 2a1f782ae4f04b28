use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("linewire {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: linewire");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("LINEWIRE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("protocols: {}", protocols().join(", "));
    println!(
        "features: endpoint=true, async={}, cli=true",
        cfg!(feature = "async")
    );

    Ok(SUCCESS)
}

fn protocols() -> Vec<&'static str> {
    let mut names = vec!["tcp", "tcp4", "tcp6"];
    if cfg!(unix) {
        names.push("unix");
    }
    names
}
