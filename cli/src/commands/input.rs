use tokio::io::AsyncReadExt;

use crate::commands::cli::InputArgs;
use crate::error::CliError;

pub async fn read_code(args: &InputArgs) -> Result<String, CliError> {
    if let Some(code) = &args.code {
        return Ok(code.clone());
    }
    if let Some(path) = &args.file {
        let path = shellexpand::tilde(path).into_owned();
        return Ok(tokio::fs::read_to_string(path).await?);
    }
    if args.stdin {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        return Ok(buf);
    }
    Err(CliError::Command(
        "one of --code, --file or --stdin is required".to_string(),
    ))
}
