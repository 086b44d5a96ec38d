//! Key command - print the cache key for an artifact

use crate::cache::{artifact_key, index_key};
use crate::cli::args::KeyArgs;
use crate::error::{ChartkitError, ChartkitResult};

/// Execute the key command
pub fn execute(args: KeyArgs) -> ChartkitResult<()> {
    println!("{}", derive_key(&args)?);
    Ok(())
}

fn derive_key(args: &KeyArgs) -> ChartkitResult<String> {
    if args.index {
        return Ok(index_key(&args.repository));
    }
    match (&args.chart, &args.chart_version) {
        (Some(chart), Some(version)) => Ok(artifact_key(&args.repository, chart, version)),
        _ => Err(ChartkitError::Internal(
            "chart and version are required unless --index is set".to_string(),
        )),
    }
}
