//! CLI command definitions and argument parsing

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use bc_core::IdentityState;
use bc_crypto::MasterKey;
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;
use zeroize::Zeroizing;

use crate::config::{CliOverrides, KeytoolConfig};
use crate::output::{
    armor, dearmor, parse_hex, IdentityOutput, OutputFormat, OutputFormatter, PayloadOutput,
    PublicKeyOutput, SignatureOutput,
};
use crate::runner::{RunError, Runner};
use crate::ExitCode;

/// BharatConnect key tool - device identity and envelope operations
#[derive(Parser, Debug)]
#[command(name = "bc-keytool")]
#[command(version, about = "BharatConnect key tool - device identity and envelope operations")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: text or json
    #[arg(long, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Config file path
    #[arg(long, global = true, env = "BC_KEYTOOL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Key store backend: file or memory
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Directory of the file key store
    #[arg(long = "store-dir", global = true, env = "BC_KEYTOOL_STORE_DIR")]
    pub store_dir: Option<PathBuf>,

    /// Per-operation timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Identity alias inside the key store
    #[arg(long, global = true)]
    pub alias: Option<String>,

    /// Envelope suite used when sealing
    #[arg(long, global = true)]
    pub suite: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage the device identity
    Identity(IdentityArgs),
    /// Encrypt a message to a recipient public key
    Encrypt(EncryptArgs),
    /// Decrypt an envelope addressed to this device
    Decrypt(DecryptArgs),
    /// Wrap a 32-byte master key to a recipient public key
    Wrap(WrapArgs),
    /// Unwrap a master key addressed to this device
    Unwrap(UnwrapArgs),
    /// Sign a message with the identity's Ed25519 companion key
    Sign(SignArgs),
}

#[derive(Args, Debug)]
pub struct IdentityArgs {
    #[command(subcommand)]
    pub action: IdentityAction,
}

#[derive(Subcommand, Debug)]
pub enum IdentityAction {
    /// Provision the identity, or report the existing one
    Init {
        /// Fail if an identity already exists
        #[arg(long)]
        strict: bool,
    },
    /// Show identity details
    Show,
    /// Export the identity public key
    Export {
        /// Write the raw key to a file instead of printing hex
        #[arg(long)]
        out: Option<PathBuf>,

        /// Base64-encode the file contents
        #[arg(long)]
        armor: bool,
    },
}

#[derive(Args, Debug)]
pub struct EncryptArgs {
    /// Recipient public key (hex)
    #[arg(long)]
    pub to: String,

    /// Read plaintext from a file ("-" for stdin)
    #[arg(long = "in", conflicts_with = "text")]
    pub input: Option<PathBuf>,

    /// Plaintext given inline
    #[arg(long)]
    pub text: Option<String>,

    /// Write the envelope to a file
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Base64-encode the envelope
    #[arg(long)]
    pub armor: bool,
}

#[derive(Args, Debug)]
pub struct DecryptArgs {
    /// Read the envelope from a file ("-" for stdin)
    #[arg(long = "in")]
    pub input: Option<PathBuf>,

    /// Write the plaintext to a file
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// The envelope is base64-encoded
    #[arg(long)]
    pub armor: bool,
}

#[derive(Args, Debug)]
#[command(group = clap::ArgGroup::new("master").required(true).args(["key", "generate"]))]
pub struct WrapArgs {
    /// Recipient public key (hex)
    #[arg(long)]
    pub to: String,

    /// Master key to wrap (hex)
    #[arg(long)]
    pub key: Option<String>,

    /// Generate a fresh master key and print it
    #[arg(long)]
    pub generate: bool,

    /// Write the wrapped key to a file
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Base64-encode the wrapped key
    #[arg(long)]
    pub armor: bool,
}

#[derive(Args, Debug)]
pub struct UnwrapArgs {
    /// Read the wrapped key from a file ("-" for stdin)
    #[arg(long = "in")]
    pub input: Option<PathBuf>,

    /// The wrapped key is base64-encoded
    #[arg(long)]
    pub armor: bool,
}

#[derive(Args, Debug)]
pub struct SignArgs {
    /// Read the message from a file ("-" for stdin)
    #[arg(long = "in", conflicts_with = "text")]
    pub input: Option<PathBuf>,

    /// Message given inline
    #[arg(long)]
    pub text: Option<String>,
}

impl Cli {
    /// Flags that override config file values
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            backend: self.backend.clone(),
            store_dir: self.store_dir.clone(),
            timeout_seconds: self.timeout,
            alias: self.alias.clone(),
            suite: self.suite.clone(),
            verbose: self.verbose,
            debug: self.debug,
        }
    }

    /// Execute the command against a resolved configuration.
    pub async fn execute_with_config(self, config: KeytoolConfig) -> anyhow::Result<ExitCode> {
        config.validate().context("invalid configuration")?;
        let runner = Runner::from_config(&config).context("failed to open key store")?;
        let ctx = Context {
            runner,
            formatter: OutputFormatter::new(self.output),
        };

        match self.command {
            Commands::Identity(args) => ctx.identity(args.action).await,
            Commands::Encrypt(args) => ctx.encrypt(args).await,
            Commands::Decrypt(args) => ctx.decrypt(args).await,
            Commands::Wrap(args) => ctx.wrap(args).await,
            Commands::Unwrap(args) => ctx.unwrap(args).await,
            Commands::Sign(args) => ctx.sign(args).await,
        }
    }
}

struct Context {
    runner: Runner,
    formatter: OutputFormatter,
}

impl Context {
    async fn identity(&self, action: IdentityAction) -> anyhow::Result<ExitCode> {
        match action {
            IdentityAction::Init { strict } => {
                let command = "identity init";
                let result = self
                    .runner
                    .run(command, move |svc| {
                        if strict {
                            return svc.provision_identity().map(|pk| (pk, "created"));
                        }
                        let existed = svc.state()? == IdentityState::Provisioned;
                        let pk = svc.generate_identity()?;
                        Ok((pk, if existed { "existing" } else { "created" }))
                    })
                    .await;
                match result {
                    Ok((pk, state)) => {
                        let out = PublicKeyOutput::new(&pk).with_state(state);
                        println!("{}", self.formatter.format_public_key(&out, command));
                        Ok(ExitCode::Success)
                    }
                    Err(err) => Ok(self.fail(command, &err)),
                }
            }
            IdentityAction::Show => {
                let command = "identity show";
                let result = self
                    .runner
                    .run(command, |svc| {
                        let pk = svc.public_key()?;
                        let info = svc.key_info()?;
                        let signing = if info.usage.signing {
                            Some(svc.signing_public_key()?)
                        } else {
                            None
                        };
                        Ok(IdentityOutput::new(&pk, &info, signing))
                    })
                    .await;
                match result {
                    Ok(identity) => {
                        println!("{}", self.formatter.format_identity(&identity));
                        Ok(ExitCode::Success)
                    }
                    Err(err) => Ok(self.fail(command, &err)),
                }
            }
            IdentityAction::Export { out, armor } => {
                let command = "identity export";
                let pk = match self.runner.run(command, |svc| svc.public_key()).await {
                    Ok(pk) => pk,
                    Err(err) => return Ok(self.fail(command, &err)),
                };
                match out {
                    Some(path) => self.emit(command, pk.as_bytes(), Some(path.as_path()), armor, None).await?,
                    None => println!(
                        "{}",
                        self.formatter.format_public_key(&PublicKeyOutput::new(&pk), command)
                    ),
                }
                Ok(ExitCode::Success)
            }
        }
    }

    async fn encrypt(&self, args: EncryptArgs) -> anyhow::Result<ExitCode> {
        let command = "encrypt";
        let recipient = match parse_hex(&args.to) {
            Ok(bytes) => bytes,
            Err(e) => return Ok(self.invalid(command, &format!("--to: {e}"))),
        };
        let plaintext = match args.text {
            Some(text) => text.into_bytes(),
            None => read_input(args.input.as_deref()).await?,
        };
        debug!(bytes = plaintext.len(), "encrypting");

        let result = self
            .runner
            .run(command, move |svc| svc.encrypt(&recipient, &plaintext))
            .await;
        match result {
            Ok(envelope) => {
                self.emit(command, &envelope, args.out.as_deref(), args.armor, None)
                    .await?;
                Ok(ExitCode::Success)
            }
            Err(err) => Ok(self.fail(command, &err)),
        }
    }

    async fn decrypt(&self, args: DecryptArgs) -> anyhow::Result<ExitCode> {
        let command = "decrypt";
        let envelope = match self.read_payload(command, args.input.as_deref(), args.armor).await? {
            Ok(bytes) => bytes,
            Err(code) => return Ok(code),
        };

        let result = self.runner.run(command, move |svc| svc.decrypt(&envelope)).await;
        match result {
            Ok(plaintext) => {
                let plaintext = Zeroizing::new(plaintext);
                self.emit(command, &plaintext, args.out.as_deref(), false, None)
                    .await?;
                Ok(ExitCode::Success)
            }
            Err(err) => Ok(self.fail(command, &err)),
        }
    }

    async fn wrap(&self, args: WrapArgs) -> anyhow::Result<ExitCode> {
        let command = "wrap";
        let recipient = match parse_hex(&args.to) {
            Ok(bytes) => bytes,
            Err(e) => return Ok(self.invalid(command, &format!("--to: {e}"))),
        };

        let (key, generated) = match args.key {
            Some(hex_key) => match parse_hex(&hex_key) {
                Ok(bytes) => (Zeroizing::new(bytes), false),
                Err(e) => return Ok(self.invalid(command, &format!("--key: {e}"))),
            },
            None => match MasterKey::generate() {
                Ok(key) => (Zeroizing::new(key.as_bytes().to_vec()), true),
                Err(e) => return Ok(self.fail(command, &RunError::Core(e.into()))),
            },
        };
        let shown = generated.then(|| hex::encode(key.as_slice()));

        let result = self
            .runner
            .run(command, move |svc| svc.wrap_key(&recipient, &key))
            .await;
        match result {
            Ok(wrapped) => {
                self.emit(command, &wrapped, args.out.as_deref(), args.armor, shown)
                    .await?;
                Ok(ExitCode::Success)
            }
            Err(err) => Ok(self.fail(command, &err)),
        }
    }

    async fn unwrap(&self, args: UnwrapArgs) -> anyhow::Result<ExitCode> {
        let command = "unwrap";
        let wrapped = match self.read_payload(command, args.input.as_deref(), args.armor).await? {
            Ok(bytes) => bytes,
            Err(code) => return Ok(code),
        };

        let result = self.runner.run(command, move |svc| svc.unwrap_key(&wrapped)).await;
        match result {
            Ok(key) => {
                let key_hex = Zeroizing::new(hex::encode(key.as_bytes()));
                println!("{}", self.formatter.format_master_key(&key_hex, command));
                Ok(ExitCode::Success)
            }
            Err(err) => Ok(self.fail(command, &err)),
        }
    }

    async fn sign(&self, args: SignArgs) -> anyhow::Result<ExitCode> {
        let command = "sign";
        let message = match args.text {
            Some(text) => text.into_bytes(),
            None => read_input(args.input.as_deref()).await?,
        };

        let result = self
            .runner
            .run(command, move |svc| {
                let signature = svc.sign(&message)?;
                Ok(SignatureOutput::new(&signature, &svc.signing_public_key()?))
            })
            .await;
        match result {
            Ok(sig) => {
                println!("{}", self.formatter.format_signature(&sig, command));
                Ok(ExitCode::Success)
            }
            Err(err) => Ok(self.fail(command, &err)),
        }
    }

    /// Read an envelope-like input, decoding base64 when armored.
    async fn read_payload(
        &self,
        command: &str,
        path: Option<&Path>,
        armored: bool,
    ) -> anyhow::Result<Result<Vec<u8>, ExitCode>> {
        let raw = read_input(path).await?;
        if !armored {
            return Ok(Ok(raw));
        }
        Ok(dearmor(&raw).map_err(|e| self.invalid(command, &e.to_string())))
    }

    /// Write a binary result to a file, inline as base64, or raw to stdout.
    async fn emit(
        &self,
        command: &str,
        bytes: &[u8],
        out: Option<&Path>,
        armored: bool,
        master_key: Option<String>,
    ) -> anyhow::Result<()> {
        if let Some(path) = out {
            let content = if armored {
                format!("{}\n", armor(bytes)).into_bytes()
            } else {
                bytes.to_vec()
            };
            tokio::fs::write(path, content)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            let payload = PayloadOutput {
                bytes: bytes.len(),
                base64: None,
                path: Some(path.display().to_string()),
                master_key,
            };
            println!("{}", self.formatter.format_payload(&payload, command));
            return Ok(());
        }

        if armored || self.formatter.is_json() {
            let payload = PayloadOutput {
                bytes: bytes.len(),
                base64: Some(armor(bytes)),
                path: None,
                master_key,
            };
            println!("{}", self.formatter.format_payload(&payload, command));
            return Ok(());
        }

        let mut stdout = tokio::io::stdout();
        stdout.write_all(bytes).await.context("failed to write stdout")?;
        stdout.flush().await.context("failed to write stdout")?;
        if let Some(key) = master_key {
            eprintln!("master key: {key}");
        }
        Ok(())
    }

    fn fail(&self, command: &str, err: &RunError) -> ExitCode {
        let code = err.exit_code();
        let line = match err.reply() {
            Some(reply) => self.formatter.format_error(reply.code, &reply.message, command),
            None => self.formatter.format_error(code.name(), &err.to_string(), command),
        };
        self.report(line);
        code
    }

    fn invalid(&self, command: &str, message: &str) -> ExitCode {
        let code = ExitCode::InvalidInput;
        self.report(self.formatter.format_error(code.name(), message, command));
        code
    }

    fn report(&self, line: String) {
        match self.formatter.format() {
            OutputFormat::Json => println!("{line}"),
            OutputFormat::Text => eprintln!("{line}"),
        }
    }
}

async fn read_input(path: Option<&Path>) -> anyhow::Result<Vec<u8>> {
    match path {
        Some(path) if path != Path::new("-") => tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display())),
        _ => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_encrypt() {
        let cli = Cli::try_parse_from([
            "bc-keytool", "encrypt", "--to", "abcd", "--text", "hi", "--armor", "--output", "json",
        ])
        .unwrap();
        assert_eq!(cli.output, OutputFormat::Json);
        match cli.command {
            Commands::Encrypt(args) => {
                assert_eq!(args.to, "abcd");
                assert_eq!(args.text.as_deref(), Some("hi"));
                assert!(args.armor);
                assert!(args.input.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_encrypt_input_conflicts_with_text() {
        let err = Cli::try_parse_from([
            "bc-keytool", "encrypt", "--to", "ab", "--text", "hi", "--in", "file",
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn test_wrap_requires_key_source() {
        assert!(Cli::try_parse_from(["bc-keytool", "wrap", "--to", "ab"]).is_err());
        assert!(Cli::try_parse_from([
            "bc-keytool", "wrap", "--to", "ab", "--key", "00", "--generate",
        ])
        .is_err());
        assert!(Cli::try_parse_from(["bc-keytool", "wrap", "--to", "ab", "--generate"]).is_ok());
    }

    #[test]
    fn test_identity_subcommands() {
        let cli = Cli::try_parse_from(["bc-keytool", "identity", "init", "--strict"]).unwrap();
        match cli.command {
            Commands::Identity(IdentityArgs {
                action: IdentityAction::Init { strict },
            }) => assert!(strict),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_become_overrides() {
        let cli = Cli::try_parse_from([
            "bc-keytool",
            "identity",
            "show",
            "--backend",
            "memory",
            "--timeout",
            "3",
            "--suite",
            "aes-256-gcm",
            "-v",
        ])
        .unwrap();
        let overrides = cli.overrides();
        assert_eq!(overrides.backend.as_deref(), Some("memory"));
        assert_eq!(overrides.timeout_seconds, Some(3));
        assert_eq!(overrides.suite.as_deref(), Some("aes-256-gcm"));
        assert!(overrides.verbose);
        assert!(!overrides.debug);
    }

    #[test]
    fn test_parse_sign() {
        let cli = Cli::try_parse_from(["bc-keytool", "sign", "--text", "challenge"]).unwrap();
        match cli.command {
            Commands::Sign(args) => assert_eq!(args.text.as_deref(), Some("challenge")),
            other => panic!("unexpected command {other:?}"),
        }
        assert!(
            Cli::try_parse_from(["bc-keytool", "sign", "--text", "a", "--in", "f"]).is_err()
        );
    }

    #[test]
    fn test_unknown_output_format() {
        assert!(Cli::try_parse_from(["bc-keytool", "identity", "show", "--output", "xml"]).is_err());
    }
}
