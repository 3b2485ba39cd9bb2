use hickory_proto::op::ResponseCode;

use crate::errors::DomainError;

/// Resolves a symbolic RCODE (`NXDomain`, `ServFail`, ...) or a decimal value.
///
/// Symbols match case-insensitively.
pub fn parse_rcode(text: &str) -> Result<ResponseCode, DomainError> {
    let symbol = text.trim().trim_start_matches(':');

    if let Ok(value) = symbol.parse::<u16>() {
        return rcode_from_value(value);
    }

    let code = match symbol.to_ascii_lowercase().as_str() {
        "noerror" => ResponseCode::NoError,
        "formerr" => ResponseCode::FormErr,
        "servfail" => ResponseCode::ServFail,
        "nxdomain" => ResponseCode::NXDomain,
        "notimp" => ResponseCode::NotImp,
        "refused" => ResponseCode::Refused,
        "yxdomain" => ResponseCode::YXDomain,
        "yxrrset" => ResponseCode::YXRRSet,
        "nxrrset" => ResponseCode::NXRRSet,
        "notauth" => ResponseCode::NotAuth,
        "notzone" => ResponseCode::NotZone,
        _ => return Err(DomainError::InvalidRcode(text.to_string())),
    };
    Ok(code)
}

/// Largest RCODE the message header can carry without an OPT record.
pub const MAX_HEADER_RCODE: u16 = 0x0F;

/// Responses are sent without EDNS, so only the 4 header bits are usable.
pub fn rcode_from_value(value: u16) -> Result<ResponseCode, DomainError> {
    if value > MAX_HEADER_RCODE {
        return Err(DomainError::InvalidRcode(value.to_string()));
    }
    Ok(value.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbolic_names() {
        assert_eq!(parse_rcode("NXDomain").unwrap(), ResponseCode::NXDomain);
        assert_eq!(parse_rcode(":ServFail").unwrap(), ResponseCode::ServFail);
        assert_eq!(parse_rcode("refused").unwrap(), ResponseCode::Refused);
        assert_eq!(parse_rcode("NotAuth").unwrap(), ResponseCode::NotAuth);
    }

    #[test]
    fn test_numeric_values() {
        assert_eq!(parse_rcode("3").unwrap(), ResponseCode::NXDomain);
        assert_eq!(rcode_from_value(5).unwrap(), ResponseCode::Refused);
        assert!(rcode_from_value(0x1000).is_err());
    }

    #[test]
    fn test_extended_values_are_rejected() {
        assert!(rcode_from_value(15).is_ok());
        assert!(matches!(
            rcode_from_value(16),
            Err(DomainError::InvalidRcode(_))
        ));
        assert!(parse_rcode("23").is_err());
    }

    #[test]
    fn test_unknown_symbol_is_rejected() {
        assert!(matches!(
            parse_rcode("Bogus"),
            Err(DomainError::InvalidRcode(_))
        ));
    }
}
