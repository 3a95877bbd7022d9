#![forbid(unsafe_code)]

//! Sellado CLI: sign, verify and inspect SRI electronic vouchers.

use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use sellado::config::{FileConfig, Overrides};
use sellado_core::Error;
use sellado_keys::{load_key_material, CertSelection};
use sellado_xades::{read_input, verify, VerifyResult, XadesSigner};

#[derive(Parser)]
#[command(
    name = "sellado",
    about = "XAdES-BES enveloped signatures for SRI electronic vouchers",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign an XML document
    Sign {
        /// Unsigned XML file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keystore password
        #[arg(short, long)]
        password: String,

        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        opts: SignOpts,
    },

    /// Verify a signed XML document
    Verify {
        /// Signed XML file
        file: PathBuf,

        /// Register additional ID attribute names
        #[arg(long = "id-attr")]
        id_attr: Vec<String>,
    },

    /// List supported algorithms, or describe a keystore
    Info {
        /// PKCS#12 keystore or PEM private key to describe
        #[arg(short = 'k', long)]
        keystore: Option<PathBuf>,

        /// Keystore password
        #[arg(short, long, default_value = "")]
        password: String,

        /// Certificate chain (PEM), for a PEM private key
        #[arg(long)]
        cert: Option<PathBuf>,
    },
}

#[derive(Args)]
struct SignOpts {
    /// PKCS#12 keystore (.p12/.pfx) or PEM private key
    #[arg(short = 'k', long)]
    keystore: Option<PathBuf>,

    /// Certificate chain (PEM), for a PEM private key
    #[arg(long)]
    cert: Option<PathBuf>,

    /// Use the certificate at this position of the keystore chain
    #[arg(long)]
    cert_index: Option<usize>,

    /// Use the certificate whose public key matches the private key
    #[arg(long)]
    match_key: bool,

    /// Digest algorithm (sha1, sha256, sha384, sha512)
    #[arg(long)]
    digest: Option<String>,

    /// Canonicalization (inclusive, exclusive)
    #[arg(long)]
    c14n: Option<String>,

    /// Embed the whole certificate chain in KeyInfo
    #[arg(long)]
    full_chain: bool,

    /// Omit KeyValue from KeyInfo
    #[arg(long)]
    no_key_value: bool,

    /// Claimed signer role
    #[arg(long)]
    role: Option<String>,

    /// Production place: city
    #[arg(long)]
    city: Option<String>,

    /// Production place: state or province
    #[arg(long)]
    province: Option<String>,

    /// Production place: postal code
    #[arg(long)]
    postal_code: Option<String>,

    /// Production place: country
    #[arg(long)]
    country: Option<String>,

    /// DataObjectFormat description
    #[arg(long)]
    description: Option<String>,

    /// DataObjectFormat MIME type
    #[arg(long)]
    mime_type: Option<String>,

    /// Also sign the element with this Id (repeatable)
    #[arg(long = "reference")]
    references: Vec<String>,

    /// Register additional ID attribute names
    #[arg(long = "id-attr")]
    id_attr: Vec<String>,
}

impl From<SignOpts> for Overrides {
    fn from(o: SignOpts) -> Self {
        Overrides {
            keystore: o.keystore,
            cert: o.cert,
            cert_index: o.cert_index,
            match_key: o.match_key,
            digest: o.digest,
            c14n: o.c14n,
            full_chain: o.full_chain,
            no_key_value: o.no_key_value,
            signer_role: o.role,
            city: o.city,
            state_or_province: o.province,
            postal_code: o.postal_code,
            country_name: o.country,
            description: o.description,
            mime_type: o.mime_type,
            references: o.references,
            id_attrs: o.id_attr,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Sign {
            input,
            output,
            password,
            config,
            opts,
        } => cmd_sign(input, output, &password, config, opts.into()),
        Commands::Verify { file, id_attr } => cmd_verify(file, id_attr),
        Commands::Info {
            keystore,
            password,
            cert,
        } => cmd_info(keystore, &password, cert),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn cmd_sign(
    input: PathBuf,
    output: Option<PathBuf>,
    password: &str,
    config_path: Option<PathBuf>,
    overrides: Overrides,
) -> Result<(), Error> {
    let file_config = match config_path {
        Some(path) => FileConfig::load(&path)?,
        None => FileConfig::default(),
    };
    let (source, config) = file_config.resolve(overrides)?;
    let key = load_key_material(&source.keystore, password, source.cert.as_deref(), source.selection)?;
    log::info!(
        "signing {} as {}",
        input.display(),
        key.signing_certificate().subject_name()
    );
    let signer = XadesSigner::new(Arc::new(key), config)?;

    match output {
        Some(out) => {
            let signed = signer.sign_file(&input, &out)?;
            eprintln!("Signed {} -> {} ({})", input.display(), out.display(), signed.signature_id());
            Ok(())
        }
        None => {
            let xml = read_input(&input)?;
            let signed = signer.sign_str(&xml)?;
            std::io::stdout()
                .write_all(signed.as_str().as_bytes())
                .map_err(|e| Error::file("<stdout>", e))
        }
    }
}

fn cmd_verify(file: PathBuf, id_attr: Vec<String>) -> Result<(), Error> {
    let xml = read_input(&file)?;
    match verify(&xml, &id_attr)? {
        VerifyResult::Valid(sig) => {
            println!("OK");
            println!("  Signature:    {}", sig.signature_id);
            println!("  Signer:       {}", sig.signer);
            println!("  Signing time: {}", sig.signing_time);
            println!("  References:   {}", sig.references);
            Ok(())
        }
        VerifyResult::Invalid { reason } => {
            eprintln!("INVALID: {reason}");
            process::exit(1);
        }
    }
}

fn cmd_info(keystore: Option<PathBuf>, password: &str, cert: Option<PathBuf>) -> Result<(), Error> {
    let Some(path) = keystore else {
        print_algorithms();
        return Ok(());
    };
    let key = load_key_material(&path, password, cert.as_deref(), CertSelection::First)?;
    println!("Key: {}", key.signing_key().algorithm_name());
    for (i, c) in key.chain().iter().enumerate() {
        let (not_before, not_after) = c.validity();
        let marker = if c == key.signing_certificate() { " (signing)" } else { "" };
        println!("Certificate #{i}{marker}");
        println!("  Subject:  {}", c.subject_name());
        println!("  Issuer:   {}", c.issuer_name());
        println!("  Serial:   {}", c.serial_decimal());
        println!("  Validity: {not_before} .. {not_after}");
    }
    Ok(())
}

fn print_algorithms() {
    println!("Sellado: XAdES-BES enveloped signatures");
    println!();
    println!("Digest algorithms:");
    println!("  SHA-1, SHA-256, SHA-384, SHA-512");
    println!();
    println!("Signature algorithms:");
    println!("  RSA PKCS#1 v1.5 (SHA-1, SHA-256, SHA-384, SHA-512)");
    println!("  ECDSA P-256/P-384 (SHA-1, SHA-256, SHA-384, SHA-512)");
    println!();
    println!("Canonicalization:");
    println!("  C14N 1.0, Exclusive C14N 1.0 (with and without comments)");
    println!();
    println!("Key material:");
    println!("  PKCS#12 (PBES2 AES-CBC, pbeWithSHA1And3-KeyTripleDES-CBC)");
    println!("  PEM private keys (PKCS#8, encrypted PKCS#8, PKCS#1, SEC1) with a PEM chain");
}

