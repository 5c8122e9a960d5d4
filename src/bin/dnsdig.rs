//! A small demo CLI exercising the public resolver API end to end.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use dnsflow::config::{parse_nameserver, Nameserver, Transport};
use dnsflow::hosts::HostsFile;
use dnsflow::{RecordType, Resolver};

#[derive(Parser)]
#[command(name = "dnsdig", about = "Look up a name through dnsflow's resolver pipeline")]
struct Args {
    /// Name to resolve.
    name: String,

    /// Record type to query for.
    #[arg(short = 't', long, default_value = "a")]
    qtype: QueryType,

    /// Nameserver addresses to query, e.g. 1.1.1.1 or tcp://8.8.8.8:53.
    /// Falls back to 1.1.1.1 and 8.8.8.8 if none are given.
    #[arg(short = 's', long = "server")]
    servers: Vec<String>,

    /// Optional hosts file to consult before the network.
    #[arg(long)]
    hosts: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum QueryType {
    A,
    Aaaa,
    Cname,
    Mx,
    Txt,
    Ns,
    Ptr,
}

impl From<QueryType> for RecordType {
    fn from(qtype: QueryType) -> Self {
        match qtype {
            QueryType::A => RecordType::A,
            QueryType::Aaaa => RecordType::AAAA,
            QueryType::Cname => RecordType::CNAME,
            QueryType::Mx => RecordType::MX,
            QueryType::Txt => RecordType::TXT,
            QueryType::Ns => RecordType::NS,
            QueryType::Ptr => RecordType::PTR,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let args = Args::parse();

    let nameservers: Vec<Nameserver> = if args.servers.is_empty() {
        vec![
            Nameserver { addr: "1.1.1.1:53".parse::<SocketAddr>()?, transport: Transport::Udp },
            Nameserver { addr: "8.8.8.8:53".parse::<SocketAddr>()?, transport: Transport::Udp },
        ]
    } else {
        args.servers
            .iter()
            .map(|s| parse_nameserver(s))
            .collect::<Result<_, _>>()?
    };

    let mut builder = Resolver::builder(nameservers);
    if let Some(path) = args.hosts {
        builder = builder.hosts_file(HostsFile::load(&path)?);
    }
    let resolver = builder.build()?;

    let records = resolver.resolve_all(&args.name, args.qtype.into()).await?;
    for record in records {
        println!("{record:?}");
    }

    Ok(())
}
