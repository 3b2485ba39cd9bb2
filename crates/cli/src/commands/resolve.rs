use anyhow::{anyhow, bail};
use conduit_dns_domain::{parse_name, Config};
use conduit_dns_infrastructure::dns::Resolver;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::RecordType;
use std::str::FromStr;
use tracing::debug;

pub async fn resolve(config: &Config, name: &str, record_type: &str) -> anyhow::Result<()> {
    let record_type = RecordType::from_str(&record_type.to_ascii_uppercase())
        .map_err(|e| anyhow!("Unknown record type {}: {}", record_type, e))?;
    let resolver = Resolver::from_config(&config.resolver).await?;
    debug!(endpoint = %resolver.endpoint(), "Resolver ready");

    match record_type {
        RecordType::A | RecordType::AAAA => {
            for address in resolver.addresses_for_types(name, &[record_type]).await? {
                println!("{}", address);
            }
        }
        _ => {
            let name = parse_name(name)?;
            let response = resolver
                .query(&name, record_type)
                .await?
                .ok_or_else(|| anyhow!("No usable response for {}", name))?;

            if response.response_code() != ResponseCode::NoError {
                bail!("{} {}: {}", name, record_type, response.response_code());
            }
            for record in response.answers() {
                println!("{}", record);
            }
        }
    }

    Ok(())
}
