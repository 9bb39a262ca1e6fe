//! PGP signature and one-pass signature packets.
//!
//! Version 3 signatures (PGP 2) carry a fixed five byte block of
//! hashed information.  Version 4 signatures carry hashed and
//! unhashed subpacket areas, see [Section 5.2.3 of RFC 4880].
//!
//!   [Section 5.2.3 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.2.3

use std::convert::TryFrom;
use std::io::{self, Write};

use crate::Error;
use crate::Result;
use crate::packet::{
    self,
    BodyLength,
    KEYID_SIZE,
    Tag,
    mpi,
};
use crate::query::{ObjectType, QueryInfo, Span};
use crate::serialize::{write_be_u16, write_be_u32, write_byte, Serialize};
use crate::signature::SignatureParams;
use crate::stream::{self, Stream};
use crate::types::{
    algorithm_to_pgp,
    pgp_to_algorithm,
    Algorithm,
    PgpAlgorithmClass,
    MAX_PKCSIZE,
    MAX_PKCSIZE_ECC,
    MIN_PKCSIZE,
    MIN_PKCSIZE_ECC,
};

/// The smallest body of a signature packet we accept.
pub const MIN_PACKET_SIZE: usize = 16;

/// The default bound on the number of subpackets in a signature.
pub const DEFAULT_MAX_SUBPACKETS: usize = 50;

/// The size of a one-pass signature packet's body.
pub const ONE_PASS_SIZE: usize = 13;

/// The highest subpacket type we know about.
const LAST_SUBPACKET: u8 = 33;

const SUBPACKET_CREATION_TIME: u8 = 2;
const SUBPACKET_ISSUER: u8 = 16;
const SUBPACKET_NOTATION: u8 = 20;

/// The notation name under which an IssuerAndSerialNumber is
/// carried.
const IANDS_NOTATION: &[u8] = b"issuerAndSerialNumber";

// DSA components are at most 256 bits.
const MIN_DSA_COMPONENT: usize = 16;
const MAX_DSA_COMPONENT: usize = 32;

/// Reads a signature packet.
pub fn read(s: &mut Stream) -> Result<QueryInfo> {
    read_with_limit(s, DEFAULT_MAX_SUBPACKETS)
}

/// Reads a signature packet, accepting at most `max_subpackets`
/// subpackets.
///
/// Spans are relative to the start of the packet, including its
/// header.  For version 3 signatures `attributes` covers the five
/// hashed bytes, for version 4 signatures the data from the version
/// byte up to the end of the hashed subpackets.
pub fn read_with_limit(s: &mut Stream, max_subpackets: usize)
                       -> Result<QueryInfo>
{
    let mut t = s.clone();
    let start = t.tell();
    let header = packet::read_object_header(&mut t, Tag::Signature,
                                            MIN_PACKET_SIZE)?;
    let len = match header.length() {
        BodyLength::Full(l) => *l as usize,
        l => return Err(Error::Internal(
            format!("Signature with length {:?}", l)).into()),
    };
    let body_start = t.tell();
    let mut body = t.sub_stream(len)?;

    let mut info = QueryInfo::new(ObjectType::Signature);
    read_body(&mut body, &mut info, max_subpackets)
        .map_err(|e| stream::truncated(e, "signature packet"))?;

    info.rebase(body_start - start);
    info.size = t.tell() - start;
    *s = t;
    Ok(info)
}

fn read_body(body: &mut Stream, info: &mut QueryInfo, max_subpackets: usize)
             -> Result<()>
{
    tracer!("signature::pgp::read_body");

    info.version = body.read_u8()?;
    t!("Version {} signature, {} bytes", info.version, body.buffer().len());
    match info.version {
        2 | 3 => read_v3(body, info)?,
        4 => read_v4(body, info, max_subpackets)?,
        v => return Err(bad_data!("Unknown signature version {}", v)),
    }

    if body.remaining() > 0 {
        return Err(bad_data!("{} bytes of trailing data in signature",
                             body.remaining()));
    }
    Ok(())
}

fn read_algorithms(body: &mut Stream, info: &mut QueryInfo) -> Result<()> {
    let (pk, _) = pgp_to_algorithm(body.read_u8()?, PgpAlgorithmClass::Pkc)?;
    let (hash, param) = pgp_to_algorithm(body.read_u8()?,
                                         PgpAlgorithmClass::Hash)?;
    info.crypt_algo = Some(pk);
    info.hash_algo = Some(hash);
    info.hash_param = param;
    Ok(())
}

fn read_v3(body: &mut Stream, info: &mut QueryInfo) -> Result<()> {
    let hashed_len = body.read_u8()?;
    if hashed_len != 5 {
        return Err(bad_data!("Hashed length {} in v3 signature",
                             hashed_len));
    }
    info.attributes = Span::new(body.tell(), 5);
    info.sig_type = body.read_u8()?;
    body.skip(4)?;
    info.key_id = body.read_bytes(KEYID_SIZE)?.to_vec();
    read_algorithms(body, info)?;
    read_trailer(body, info)
}

fn read_v4(body: &mut Stream, info: &mut QueryInfo, max_subpackets: usize)
           -> Result<()>
{
    // The version byte is part of the hashed data.
    let hashed_start = body.tell() - 1;
    info.sig_type = body.read_u8()?;
    read_algorithms(body, info)?;

    let mut count = 0;
    for hashed in &[true, false] {
        let len = body.read_be_u16()? as usize;
        let offset = body.tell();
        let mut area = body.sub_stream(len)?;
        let seen_timestamp = read_subpackets(&mut area, offset, *hashed, info,
                                             &mut count, max_subpackets)?;
        if *hashed {
            if ! seen_timestamp {
                return Err(bad_data!("No creation time in hashed subpackets"));
            }
            info.attributes = Span::new(hashed_start,
                                        body.tell() - hashed_start);
        }
    }

    read_trailer(body, info)
}

// Reads the hash quick check and the signature MPIs.
fn read_trailer(body: &mut Stream, info: &mut QueryInfo) -> Result<()> {
    let check = body.read_bytes(2)?;
    info.hash_check = Some([check[0], check[1]]);

    let start = body.tell();
    match info.crypt_algo {
        Some(Algorithm::RSA) => {
            let value = mpi::read_mpi(body, MIN_PKCSIZE, MAX_PKCSIZE)?;
            info.data = Span::new(body.tell() - value.len(), value.len());
        }
        Some(Algorithm::DSA) => {
            mpi::read_mpi(body, MIN_DSA_COMPONENT, MAX_DSA_COMPONENT)?;
            mpi::read_mpi(body, MIN_DSA_COMPONENT, MAX_DSA_COMPONENT)?;
            info.data = Span::new(start, body.tell() - start);
        }
        Some(Algorithm::ECDSA) => {
            mpi::read_mpi(body, MIN_PKCSIZE_ECC, MAX_PKCSIZE_ECC)?;
            mpi::read_mpi(body, MIN_PKCSIZE_ECC, MAX_PKCSIZE_ECC)?;
            info.data = Span::new(start, body.tell() - start);
        }
        Some(a) => return Err(Error::NotAvailable(
            format!("{} signatures", a)).into()),
        None => return Err(Error::Internal(
            "Signature algorithm not set".into()).into()),
    }
    Ok(())
}

// Returns whether the area holds a creation time.
fn read_subpackets(area: &mut Stream, offset: usize, hashed: bool,
                   info: &mut QueryInfo, count: &mut usize,
                   max_subpackets: usize)
                   -> Result<bool>
{
    tracer!("signature::pgp::read_subpackets");

    let mut seen_timestamp = false;

    while area.remaining() > 0 {
        *count += 1;
        if *count > max_subpackets {
            return Err(bad_data!("More than {} signature subpackets",
                                 max_subpackets));
        }

        let len = match packet::read_partial_length(area)? {
            BodyLength::Full(l) => l as usize,
            l => return Err(bad_data!("Subpacket length {:?}", l)),
        };
        if len == 0 {
            return Err(bad_data!("Empty subpacket"));
        }
        let raw_type = area.read_u8()?;
        let value_offset = offset + area.tell();
        let mut value = area.sub_stream(len - 1)?;
        let critical = raw_type & 0x80 != 0;
        let typ = raw_type & 0x7F;

        match typ {
            SUBPACKET_CREATION_TIME => {
                if value.remaining() != 4 {
                    return Err(bad_data!("Creation time of {} bytes",
                                         value.remaining()));
                }
                t!("Created at {}", value.read_be_u32()?);
                seen_timestamp = true;
            }
            SUBPACKET_ISSUER => {
                if value.remaining() != KEYID_SIZE {
                    return Err(bad_data!("Issuer of {} bytes",
                                         value.remaining()));
                }
                // The first one wins.
                if info.key_id.is_empty() {
                    info.key_id = value.read_bytes(KEYID_SIZE)?.to_vec();
                }
            }
            SUBPACKET_NOTATION =>
                read_notation(&mut value, value_offset, info)?,
            t if t > LAST_SUBPACKET && critical =>
                return Err(bad_data!("Unknown critical subpacket {}", t)),
            t if t > LAST_SUBPACKET =>
                log::warn!("Skipping unknown {} subpacket {}",
                           if hashed { "hashed" } else { "unhashed" }, t),
            t => t!("Ignoring subpacket {}", t),
        }
    }
    Ok(seen_timestamp)
}

// A notation is four bytes of flags, the name and value lengths, the
// name, and the value.  Only the one carrying an
// IssuerAndSerialNumber matters to us.
fn read_notation(value: &mut Stream, offset: usize, info: &mut QueryInfo)
                 -> Result<()>
{
    value.skip(4)?;
    let name_len = value.read_be_u16()? as usize;
    let value_len = value.read_be_u16()? as usize;
    if value.remaining() != name_len + value_len {
        return Err(bad_data!("Notation of {} bytes, expected {}",
                             value.remaining(), name_len + value_len));
    }
    let name = value.read_bytes(name_len)?;
    if name_len == IANDS_NOTATION.len() && name == IANDS_NOTATION {
        info.iands = Span::new(offset + value.tell(), value_len);
    }
    Ok(())
}

// Converts a length to its 16-bit wire form.
fn length_u16(what: &str, len: usize) -> Result<u16> {
    u16::try_from(len).map_err(|_| Error::InvalidArgument(
        format!("{} of {} bytes", what, len)).into())
}

fn write_subpacket(o: &mut Vec<u8>, typ: u8, value: &[u8]) -> Result<()> {
    let len = u32::try_from(1 + value.len()).map_err(|_| {
        Error::InvalidArgument(format!("Subpacket of {} bytes", value.len()))
    })?;
    BodyLength::Full(len).serialize(o)?;
    write_byte(o, typ)?;
    o.write_all(value)?;
    Ok(())
}

fn check_key_id(p: &SignatureParams) -> Result<()> {
    if p.key_id.len() != KEYID_SIZE {
        return Err(Error::InvalidArgument(
            format!("PGP key ID of {} bytes", p.key_id.len())).into());
    }
    Ok(())
}

// RSA signatures are a bare value, DLP signatures come as a pair of
// encoded MPIs.
fn write_signature_value(o: &mut Vec<u8>, p: &SignatureParams)
                         -> Result<()> {
    if p.sign_algo == Algorithm::RSA {
        mpi::write_mpi(o, p.signature)
    } else {
        o.write_all(p.signature)?;
        Ok(())
    }
}

fn write_packet(o: &mut dyn io::Write, body: &[u8]) -> Result<()> {
    let len = u32::try_from(body.len()).map_err(|_| Error::InvalidArgument(
        format!("Signature packet of {} bytes", body.len())))?;
    packet::write_packet_header(o, Tag::Signature, BodyLength::Full(len))?;
    o.write_all(body)?;
    Ok(())
}

/// Writes a version 4 signature packet.
///
/// The creation time goes into the hashed area, the issuer into the
/// unhashed one.  An IssuerAndSerialNumber, if given, is carried as a
/// hashed notation.
pub fn write(o: &mut dyn io::Write, p: &SignatureParams) -> Result<()> {
    p.check_signature_size()?;
    let (hash, param) = p.require_hash()?;
    check_key_id(p)?;
    let pk = algorithm_to_pgp(p.sign_algo, 0, PgpAlgorithmClass::Pkc)?;
    let hash = algorithm_to_pgp(hash, param, PgpAlgorithmClass::Hash)?;

    let mut hashed = Vec::new();
    write_subpacket(&mut hashed, SUBPACKET_CREATION_TIME,
                    &p.creation_time.to_be_bytes())?;
    if ! p.iands.is_empty() {
        let mut notation = vec![0; 4];
        write_be_u16(&mut notation,
                     length_u16("Notation name", IANDS_NOTATION.len())?)?;
        write_be_u16(&mut notation,
                     length_u16("IssuerAndSerialNumber", p.iands.len())?)?;
        notation.extend_from_slice(IANDS_NOTATION);
        notation.extend_from_slice(p.iands);
        write_subpacket(&mut hashed, SUBPACKET_NOTATION, &notation)?;
    }
    let mut unhashed = Vec::new();
    write_subpacket(&mut unhashed, SUBPACKET_ISSUER, p.key_id)?;

    let mut body = vec![4, p.sig_type, pk, hash];
    write_be_u16(&mut body, length_u16("Hashed area", hashed.len())?)?;
    body.extend_from_slice(&hashed);
    write_be_u16(&mut body, length_u16("Unhashed area", unhashed.len())?)?;
    body.extend_from_slice(&unhashed);
    body.extend_from_slice(&p.hash_check);
    write_signature_value(&mut body, p)?;

    write_packet(o, &body)
}

/// Writes a version 3 signature packet, as produced by PGP 2.
pub fn write_v3(o: &mut dyn io::Write, p: &SignatureParams) -> Result<()> {
    p.check_signature_size()?;
    let (hash, param) = p.require_hash()?;
    check_key_id(p)?;
    let pk = algorithm_to_pgp(p.sign_algo, 0, PgpAlgorithmClass::Pkc)?;
    let hash = algorithm_to_pgp(hash, param, PgpAlgorithmClass::Hash)?;

    let mut body = vec![3, 5, p.sig_type];
    write_be_u32(&mut body, p.creation_time)?;
    body.extend_from_slice(p.key_id);
    body.extend_from_slice(&[pk, hash]);
    body.extend_from_slice(&p.hash_check);
    write_signature_value(&mut body, p)?;

    write_packet(o, &body)
}

/// The contents of a one-pass signature packet.
///
/// See [Section 5.4 of RFC 4880].
///
///   [Section 5.4 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.4
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OnePassSig {
    /// The signature type.
    pub sig_type: u8,
    /// The hash algorithm.
    pub hash_algo: Algorithm,
    /// The hash algorithm's parameter.
    pub hash_param: usize,
    /// The public key algorithm.
    pub pk_algo: Algorithm,
    /// The signer's key ID.
    pub key_id: [u8; KEYID_SIZE],
    /// Whether this is the last one-pass signature before the data.
    pub last: bool,
}

impl OnePassSig {
    /// Parses the body of a one-pass signature packet.
    pub fn from_body(body: &[u8]) -> Result<Self> {
        let mut s = Stream::new(body);
        let version = s.read_u8()?;
        if version != 3 {
            return Err(bad_data!("One-pass signature version {}", version));
        }
        let sig_type = s.read_u8()?;
        let (hash_algo, hash_param) =
            pgp_to_algorithm(s.read_u8()?, PgpAlgorithmClass::Hash)?;
        let (pk_algo, _) = pgp_to_algorithm(s.read_u8()?,
                                            PgpAlgorithmClass::Pkc)?;
        let mut key_id = [0; KEYID_SIZE];
        key_id.copy_from_slice(s.read_bytes(KEYID_SIZE)?);
        let last = s.read_u8()? != 0;
        if s.remaining() > 0 {
            return Err(bad_data!("One-pass signature of {} bytes",
                                 body.len()));
        }
        Ok(OnePassSig { sig_type, hash_algo, hash_param, pk_algo, key_id,
                        last })
    }

    /// Writes the packet, including its header.
    pub fn write(&self, o: &mut dyn io::Write) -> Result<()> {
        let body = [
            3,
            self.sig_type,
            algorithm_to_pgp(self.hash_algo, self.hash_param,
                             PgpAlgorithmClass::Hash)?,
            algorithm_to_pgp(self.pk_algo, 0, PgpAlgorithmClass::Pkc)?,
        ];
        packet::write_packet_header(o, Tag::OnePassSig,
                                    BodyLength::Full(ONE_PASS_SIZE as u32))?;
        o.write_all(&body)?;
        o.write_all(&self.key_id)?;
        o.write_all(&[self.last as u8])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::tests::IANDS;

    fn kind(e: &anyhow::Error) -> Option<&Error> {
        e.downcast_ref::<Error>()
    }

    const KEY_ID: [u8; 8] = [0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x02, 0x03, 0x04];

    fn params(sig: &[u8]) -> SignatureParams {
        SignatureParams::new(Algorithm::RSA, sig)
            .hash(Algorithm::SHA1, 0)
            .key_id(&KEY_ID)
            .sig_type(0x00)
            .creation_time(0x5F5E_1000)
            .hash_check([0x12, 0x34])
    }

    // A creation time subpacket.
    const CREATED: [u8; 6] = [5, 2, 0x5F, 0x5E, 0x10, 0x00];

    // Builds a v4 signature with a creation time followed by `hashed`
    // in the hashed subpacket area.
    fn with_hashed_area(hashed: &[u8]) -> Vec<u8> {
        let mut area = CREATED.to_vec();
        area.extend_from_slice(hashed);
        with_exact_hashed_area(&area)
    }

    fn with_exact_hashed_area(hashed: &[u8]) -> Vec<u8> {
        let mut body = vec![4, 0x00, 1, 2];
        write_be_u16(&mut body, hashed.len() as u16).unwrap();
        body.extend_from_slice(hashed);
        let mut unhashed = Vec::new();
        write_subpacket(&mut unhashed, SUBPACKET_ISSUER, &KEY_ID).unwrap();
        write_be_u16(&mut body, unhashed.len() as u16).unwrap();
        body.extend_from_slice(&unhashed);
        body.extend_from_slice(&[0x12, 0x34]);
        mpi::write_mpi(&mut body, &[0x99; 128]).unwrap();
        let mut packet = Vec::new();
        write_packet(&mut packet, &body).unwrap();
        packet
    }

    #[test]
    fn v4() {
        let sig = [0x81; 128];
        let p = params(&sig).issuer_and_serial_number(IANDS);
        let mut packet = Vec::new();
        write(&mut packet, &p).unwrap();

        let info = read(&mut Stream::new(&packet)).unwrap();
        assert_eq!(info.version, 4);
        assert_eq!(info.size, packet.len());
        assert_eq!(info.key_id, KEY_ID);
        assert_eq!(info.hash_algo, Some(Algorithm::SHA1));
        assert_eq!(info.hash_check, Some([0x12, 0x34]));
        assert_eq!(info.data.slice(&packet).unwrap(), &sig[..]);
        assert_eq!(info.iands.slice(&packet).unwrap(), IANDS);

        // The hashed data runs from the version byte to the end of
        // the hashed area.
        let hashed = info.attributes.slice(&packet).unwrap();
        assert_eq!(&hashed[..4], &[4, 0x00, 1, 2]);
        let area_len = u16::from_be_bytes([hashed[4], hashed[5]]) as usize;
        assert_eq!(hashed.len(), 6 + area_len);
    }

    #[test]
    fn v3() {
        let sig = [0x81; 130];
        let mut packet = Vec::new();
        write_v3(&mut packet, &params(&sig)).unwrap();

        let info = read(&mut Stream::new(&packet)).unwrap();
        assert_eq!(info.version, 3);
        assert_eq!(info.key_id, KEY_ID);
        assert_eq!(info.attributes.slice(&packet).unwrap(),
                   &[0x00, 0x5F, 0x5E, 0x10, 0x00]);
        assert_eq!(info.data.slice(&packet).unwrap(), &sig[..]);

        // The hashed length has to be five.
        let mut bad = packet.clone();
        bad[3] = 6;
        let e = read(&mut Stream::new(&bad)).unwrap_err();
        assert!(matches!(kind(&e), Some(Error::BadData(_))));
    }

    #[test]
    fn dlp_signatures() {
        let mut pair = Vec::new();
        mpi::write_mpi(&mut pair, &[0x71; 32]).unwrap();
        mpi::write_mpi(&mut pair, &[0x72; 31]).unwrap();
        for algo in &[Algorithm::DSA, Algorithm::ECDSA] {
            let p = SignatureParams::new(*algo, &pair)
                .hash(Algorithm::SHA2, 32)
                .key_id(&KEY_ID);
            let mut packet = Vec::new();
            write(&mut packet, &p).unwrap();
            let info = read(&mut Stream::new(&packet)).unwrap();
            assert_eq!(info.crypt_algo, Some(*algo));
            assert_eq!(info.data.slice(&packet).unwrap(), &pair[..]);
        }

        // Too short for ECDSA.
        let mut short = Vec::new();
        mpi::write_mpi(&mut short, &[0x71; 20]).unwrap();
        mpi::write_mpi(&mut short, &[0x72; 20]).unwrap();
        let p = SignatureParams::new(Algorithm::ECDSA, &short)
            .hash(Algorithm::SHA2, 32)
            .key_id(&KEY_ID);
        let mut packet = Vec::new();
        write(&mut packet, &p).unwrap();
        let e = read(&mut Stream::new(&packet)).unwrap_err();
        assert!(matches!(kind(&e), Some(Error::BadData(_))));
    }

    #[test]
    fn critical_subpackets() {
        // Type 100, critical.
        let e = read(&mut Stream::new(&with_hashed_area(&[2, 0x80 | 100, 0])))
            .unwrap_err();
        assert!(matches!(kind(&e), Some(Error::BadData(_))), "{}", e);

        // The same, not critical.
        let info = read(&mut Stream::new(&with_hashed_area(&[2, 100, 0])))
            .unwrap();
        assert_eq!(info.key_id, KEY_ID);

        // A known type with the critical bit is fine.
        read(&mut Stream::new(&with_hashed_area(&[5, 0x80 | 2, 0, 0, 0, 1])))
            .unwrap();

        // The highest known type isn't rejected.
        read(&mut Stream::new(&with_hashed_area(&[2, 0x80 | 33, 0])))
            .unwrap();
    }

    #[test]
    fn subpacket_limit() {
        let mut hashed = Vec::new();
        for _ in 0..10 {
            hashed.extend_from_slice(&[2, 100, 0]);
        }
        let packet = with_hashed_area(&hashed);
        // The creation time and ten more hashed, plus one unhashed.
        read_with_limit(&mut Stream::new(&packet), 12).unwrap();
        let e = read_with_limit(&mut Stream::new(&packet), 11).unwrap_err();
        assert!(matches!(kind(&e), Some(Error::BadData(_))));
    }

    #[test]
    fn creation_time_required() {
        read(&mut Stream::new(&with_exact_hashed_area(&CREATED))).unwrap();

        // Only in the unhashed area doesn't count.
        let e = read(&mut Stream::new(&with_exact_hashed_area(&[])))
            .unwrap_err();
        assert!(matches!(kind(&e), Some(Error::BadData(_))), "{}", e);
        let e = read(&mut Stream::new(&with_exact_hashed_area(&[2, 100, 0])))
            .unwrap_err();
        assert!(matches!(kind(&e), Some(Error::BadData(_))), "{}", e);
    }

    #[test]
    fn oversized_values_rejected() {
        let sig = vec![0x81; 2000];
        for v3 in &[false, true] {
            let mut packet = Vec::new();
            let e = if *v3 {
                write_v3(&mut packet, &params(&sig))
            } else {
                write(&mut packet, &params(&sig))
            }.unwrap_err();
            assert!(matches!(kind(&e), Some(Error::InvalidArgument(_))));
            assert!(packet.is_empty());
        }

        let sig = [0x81; 128];
        let iands = vec![0x30; 70000];
        let mut packet = Vec::new();
        let p = params(&sig).issuer_and_serial_number(&iands);
        let e = write(&mut packet, &p).unwrap_err();
        assert!(matches!(kind(&e), Some(Error::InvalidArgument(_))));
    }

    #[test]
    fn notations() {
        // Wrong name length: ignored.
        let mut n = vec![0x80, 0, 0, 0, 0, 4, 0, 2];
        n.extend_from_slice(b"abcd");
        n.extend_from_slice(&[1, 2]);
        let mut hashed = Vec::new();
        write_subpacket(&mut hashed, SUBPACKET_NOTATION, &n).unwrap();
        let info = read(&mut Stream::new(&with_hashed_area(&hashed))).unwrap();
        assert!(info.iands.is_empty());

        // Lengths that don't add up.
        let mut n = vec![0, 0, 0, 0, 0, 4, 0, 9];
        n.extend_from_slice(b"abcd");
        let mut hashed = Vec::new();
        write_subpacket(&mut hashed, SUBPACKET_NOTATION, &n).unwrap();
        let e = read(&mut Stream::new(&with_hashed_area(&hashed)))
            .unwrap_err();
        assert!(matches!(kind(&e), Some(Error::BadData(_))));
    }

    #[test]
    fn overlong_subpacket() {
        // A subpacket that claims more than its area holds is bad
        // data, not a request for more input.
        let e = read(&mut Stream::new(&with_hashed_area(&[9, 2, 0, 0])))
            .unwrap_err();
        assert!(matches!(kind(&e), Some(Error::BadData(_))), "{}", e);
    }

    #[test]
    fn trailing_data() {
        let sig = [0x81; 128];
        let mut body = Vec::new();
        write(&mut body, &params(&sig)).unwrap();
        // Re-frame the body with one extra byte.
        let mut s = Stream::new(&body);
        let h = packet::read_packet_header(&mut s, 0, 10000, false).unwrap();
        let mut inner = s.rest().to_vec();
        inner.push(0);
        let mut packet = Vec::new();
        write_packet(&mut packet, &inner).unwrap();
        assert_eq!(h.tag(), Tag::Signature);
        let e = read(&mut Stream::new(&packet)).unwrap_err();
        assert!(matches!(kind(&e), Some(Error::BadData(_))));
    }

    #[test]
    fn one_pass() {
        let ops = OnePassSig {
            sig_type: 0x01,
            hash_algo: Algorithm::SHA2,
            hash_param: 48,
            pk_algo: Algorithm::DSA,
            key_id: KEY_ID,
            last: true,
        };
        let mut packet = Vec::new();
        ops.write(&mut packet).unwrap();
        assert_eq!(packet.len(), 2 + ONE_PASS_SIZE);
        assert_eq!(OnePassSig::from_body(&packet[2..]).unwrap(), ops);

        let mut bad = packet[2..].to_vec();
        bad[0] = 4;
        assert!(OnePassSig::from_body(&bad).is_err());
        assert!(OnePassSig::from_body(&packet[2..10]).is_err());
    }
}
