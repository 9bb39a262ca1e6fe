//! The DER-based signature formats.

use std::io;

use crate::algid::{self, AlgoClass, Param};
use crate::asn1;
use crate::Error;
use crate::Result;
use crate::query::{ObjectType, QueryInfo, Span};
use crate::signature::{
    MAX_SIGNATURE_SIZE,
    MIN_SIGNATURE_SIZE,
    SignatureParams,
};
use crate::stream::Stream;
use crate::types::Algorithm;

/// The SignerInfo version of signatures identified by
/// IssuerAndSerialNumber.
pub(crate) const CMS_VERSION: u64 = 1;

/// The SignerInfo version of signatures identified by key ID.
pub(crate) const CRYPTLIB_VERSION: u64 = 3;

fn check_signature_size(len: usize) -> Result<()> {
    if len > MAX_SIGNATURE_SIZE {
        return Err(Error::BadData(
            format!("Signature of {} bytes", len)).into());
    }
    Ok(())
}

// The hash parameters of a signature AlgorithmIdentifier.
fn sig_params(hash: Algorithm, param: usize) -> (Param, Param) {
    match hash {
        Algorithm::SHA2 if param == 0 =>
            (Param::Hash(hash), Param::Size(32)),
        Algorithm::SHA2 => (Param::Hash(hash), Param::Size(param)),
        _ => (Param::Hash(hash), Param::None),
    }
}

// The parameter of a hash AlgorithmIdentifier.
fn hash_param(hash: Algorithm, param: usize) -> Param {
    match hash {
        Algorithm::SHA2 if param == 0 => Param::Size(32),
        Algorithm::SHA2 => Param::Size(param),
        _ => Param::None,
    }
}

fn write_bit_string(o: &mut dyn io::Write, data: &[u8]) -> Result<()> {
    let der = yasna::construct_der(|w| {
        w.write_bitvec_bytes(data, data.len() * 8)
    });
    o.write_all(&der)?;
    Ok(())
}

pub(crate) fn read_raw(s: &mut Stream) -> Result<QueryInfo> {
    let mut t = s.clone();
    let start = t.tell();
    let mut info = QueryInfo::new(ObjectType::Signature);

    let len = asn1::read_bit_string_hole(&mut t, MIN_SIGNATURE_SIZE)?;
    check_signature_size(len)?;
    info.data = Span::new(t.tell() - start, len);
    t.skip(len)?;

    info.size = t.tell() - start;
    *s = t;
    Ok(info)
}

pub(crate) fn write_raw(o: &mut dyn io::Write, p: &SignatureParams)
                        -> Result<()> {
    p.check_signature_size()?;
    write_bit_string(o, p.signature)
}

pub(crate) fn read_x509(s: &mut Stream) -> Result<QueryInfo> {
    let mut t = s.clone();
    let start = t.tell();
    let mut info = QueryInfo::new(ObjectType::Signature);

    let id = algid::read_algo_id(&mut t, AlgoClass::PkcSig)?;
    let (hash, param) = id.hash().ok_or_else(|| Error::Internal(
        format!("Signature algorithm {} without a hash", id)))?;
    info.crypt_algo = Some(id.algorithm);
    info.hash_algo = Some(hash);
    info.hash_param = param;

    let len = asn1::read_bit_string_hole(&mut t, MIN_SIGNATURE_SIZE)?;
    check_signature_size(len)?;
    info.data = Span::new(t.tell() - start, len);
    t.skip(len)?;

    info.size = t.tell() - start;
    *s = t;
    Ok(info)
}

pub(crate) fn write_x509(o: &mut dyn io::Write, p: &SignatureParams)
                         -> Result<()> {
    p.check_signature_size()?;
    let (hash, param) = p.require_hash()?;
    let (p1, p2) = sig_params(hash, param);
    o.write_all(&algid::write_algo_id(p.sign_algo, p1, p2)?)?;
    write_bit_string(o, p.signature)
}

// Reads what follows the signer identification in a SignerInfo:
//
//   digestAlgorithm       AlgorithmIdentifier,
//   signedAttrs       [0] IMPLICIT SET OF Attribute OPTIONAL,
//   signatureAlgorithm    AlgorithmIdentifier,
//   signature             OCTET STRING,
//   unsignedAttrs     [1] IMPLICIT SET OF Attribute OPTIONAL
fn read_signer_body(t: &mut Stream, start: usize, end: usize,
                    info: &mut QueryInfo)
                    -> Result<()>
{
    let hash = algid::read_algo_id(t, AlgoClass::Hash)?;
    info.hash_algo = Some(hash.algorithm);
    info.hash_param = hash.size();

    if asn1::peek_tag(t)? == asn1::ctag(0) {
        let pos = t.tell();
        let attributes = asn1::read_raw_object(t)?;
        info.attributes = Span::new(pos - start, attributes.len());
    }

    let (id, _) = algid::read_algo_id_either(t, AlgoClass::Pkc,
                                             AlgoClass::PkcSig)?;
    info.crypt_algo = Some(id.algorithm);

    let len = asn1::read_octet_string_hole(t, MIN_SIGNATURE_SIZE)?;
    check_signature_size(len)?;
    info.data = Span::new(t.tell() - start, len);
    t.skip(len)?;

    if t.tell() < end && asn1::peek_tag(t)? == asn1::ctag(1) {
        let pos = t.tell();
        let attributes = asn1::read_raw_object(t)?;
        info.unauth_attributes = Span::new(pos - start, attributes.len());
    }

    if t.tell() != end {
        return Err(Error::BadData(
            format!("SignerInfo ends at {}, expected {}",
                    t.tell() - start, end - start)).into());
    }
    Ok(())
}

fn read_signer_info(s: &mut Stream, version: u64) -> Result<QueryInfo> {
    let mut t = s.clone();
    let start = t.tell();
    let mut info = QueryInfo::new(ObjectType::Signature);

    let len = asn1::read_sequence(&mut t)?;
    let end = t.tell() + len;
    let v = asn1::read_short_integer(&mut t)?;
    if v != version {
        return Err(Error::BadData(
            format!("SignerInfo version {}, expected {}", v, version))
                   .into());
    }
    info.version = version as u8;

    if version == CMS_VERSION {
        let pos = t.tell();
        if asn1::peek_tag(&t)? != asn1::BER_SEQUENCE {
            return Err(Error::BadData(
                "Invalid IssuerAndSerialNumber".into()).into());
        }
        let iands = asn1::read_raw_object(&mut t)?;
        info.iands = Span::new(pos - start, iands.len());
    } else {
        info.key_id = asn1::read_octet_string_tagged(
            &mut t, asn1::ptag(0), 8, 64)?.to_vec();
    }

    read_signer_body(&mut t, start, end, &mut info)?;

    info.size = t.tell() - start;
    *s = t;
    Ok(info)
}

pub(crate) fn read_cms(s: &mut Stream) -> Result<QueryInfo> {
    read_signer_info(s, CMS_VERSION)
}

pub(crate) fn read_cryptlib(s: &mut Stream) -> Result<QueryInfo> {
    read_signer_info(s, CRYPTLIB_VERSION)
}

// Gives an encoded SET of attributes the implicit tag `[n]`.
fn retag_attributes(set: &[u8], n: u8) -> Result<Vec<u8>> {
    let mut s = Stream::new(set);
    asn1::read_set(&mut s)
        .and_then(|len| s.skip(len))
        .map_err(|_| Error::InvalidArgument(
            "Attributes must be an encoded SET".into()))?;
    if s.remaining() > 0 {
        return Err(Error::InvalidArgument(
            "Trailing data after attributes".into()).into());
    }
    let mut tagged = set.to_vec();
    tagged[0] = asn1::ctag(n);
    Ok(tagged)
}

fn write_signer_info(o: &mut dyn io::Write, p: &SignatureParams,
                     version: u64)
                     -> Result<()>
{
    p.check_signature_size()?;
    let (hash, param) = p.require_hash()?;
    let hash_id = algid::write_algo_id(hash, hash_param(hash, param),
                                       Param::None)?;
    let sig_id = algid::write_algo_id(p.sign_algo, Param::None,
                                      Param::None)?;
    let attributes = p.attributes.map(|a| retag_attributes(a, 0))
        .transpose()?;
    let unauth = p.unauth_attributes.map(|a| retag_attributes(a, 1))
        .transpose()?;

    if version == CMS_VERSION {
        let mut s = Stream::new(p.iands);
        let ok = asn1::peek_tag(&s).ok() == Some(asn1::BER_SEQUENCE)
            && asn1::read_raw_object(&mut s).is_ok()
            && s.remaining() == 0;
        if ! ok {
            return Err(Error::InvalidArgument(
                "Invalid IssuerAndSerialNumber".into()).into());
        }
    } else if p.key_id.len() < 8 || p.key_id.len() > 64 {
        return Err(Error::InvalidArgument(
            format!("Key ID of {} bytes", p.key_id.len())).into());
    }

    let der = yasna::construct_der(|w| {
        w.write_sequence(|w| {
            w.next().write_u32(version as u32);
            if version == CMS_VERSION {
                w.next().write_der(p.iands);
            } else {
                w.next().write_tagged_implicit(yasna::Tag::context(0),
                                               |w| w.write_bytes(p.key_id));
            }
            w.next().write_der(&hash_id);
            if let Some(a) = &attributes {
                w.next().write_der(a);
            }
            w.next().write_der(&sig_id);
            w.next().write_bytes(p.signature);
            if let Some(a) = &unauth {
                w.next().write_der(a);
            }
        })
    });
    o.write_all(&der)?;
    Ok(())
}

pub(crate) fn write_cms(o: &mut dyn io::Write, p: &SignatureParams)
                        -> Result<()> {
    write_signer_info(o, p, CMS_VERSION)
}

pub(crate) fn write_cryptlib(o: &mut dyn io::Write, p: &SignatureParams)
                             -> Result<()> {
    write_signer_info(o, p, CRYPTLIB_VERSION)
}
