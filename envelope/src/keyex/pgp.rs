//! PGP session key packets.
//!
//! A Symmetric-Key Encrypted Session Key packet (SKE, [Section 5.3 of
//! RFC 4880]) derives a key from a password.  It may carry the
//! session key encrypted with the derived key; otherwise the derived
//! key is the session key.  A Public-Key Encrypted Session Key packet
//! (PKE, [Section 5.1]) carries the session key encrypted to a public
//! key.
//!
//!   [Section 5.3 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-5.3
//!   [Section 5.1]: https://tools.ietf.org/html/rfc4880#section-5.1

use std::io::{self, Write};

use crate::Error;
use crate::Result;
use crate::keyex::{KekParams, KeySetup, KeyTransParams};
use crate::packet::{self, mpi, BodyLength, Header, KEYID_SIZE, Tag};
use crate::query::{ObjectType, QueryInfo, Span};
use crate::serialize::Serialize;
use crate::stream::{self, Stream};
use crate::crypto::S2K;
use crate::types::{
    algorithm_to_pgp,
    pgp_to_algorithm,
    Algorithm,
    CipherMode,
    PgpAlgorithmClass,
    MAX_PKCSIZE,
    MAX_WORKING_KEYSIZE,
    MIN_KEYSIZE,
    MIN_PKCSIZE,
};

/// The smallest SKE body: version, cipher, and a simple S2K.
pub const MIN_SKE_SIZE: usize = 4;

/// The smallest PKE body: version, key ID, algorithm, and an empty
/// MPI.
pub const MIN_PKE_SIZE: usize = 12;

const SKE_VERSION: u8 = 4;
const PKE_VERSION: u8 = 3;

// The encrypted session key is the cipher octet plus the key.
const MIN_ESK_SIZE: usize = 1 + MIN_KEYSIZE;
const MAX_ESK_SIZE: usize = 1 + MAX_WORKING_KEYSIZE;

fn body_length(header: &Header) -> Result<usize> {
    match header.length() {
        BodyLength::Full(l) => Ok(*l as usize),
        l => Err(Error::Internal(
            format!("{} with length {:?}", header.tag(), l)).into()),
    }
}

/// Reads an SKE packet.
///
/// The GNU dummy S2K is recognized and reported as `NotAvailable`.
pub fn read_ske(s: &mut Stream) -> Result<QueryInfo> {
    let mut t = s.clone();
    let start = t.tell();
    let header = packet::read_object_header(&mut t, Tag::SKE, MIN_SKE_SIZE)?;
    let len = body_length(&header)?;
    let body_start = t.tell();
    let mut body = t.sub_stream(len)?;

    let mut info = QueryInfo::new(ObjectType::EncryptedKey);
    read_ske_body(&mut body, &mut info)
        .map_err(|e| stream::truncated(e, "SKE packet"))?;

    info.rebase(body_start - start);
    info.size = t.tell() - start;
    *s = t;
    Ok(info)
}

fn read_ske_body(body: &mut Stream, info: &mut QueryInfo) -> Result<()> {
    tracer!("keyex::pgp::read_ske_body");

    let version = body.read_u8()?;
    if version != SKE_VERSION {
        return Err(bad_data!("SKE version {}", version));
    }
    info.version = version;

    let (cipher, key_size) = pgp_to_algorithm(body.read_u8()?,
                                              PgpAlgorithmClass::PasswordCrypt)?;
    info.crypt_algo = Some(cipher);
    info.crypt_mode = CipherMode::CFB;
    info.key_size = key_size;

    let s2k = S2K::read(body)?.ready_or(Error::NotAvailable(
        "SKE with a GNU dummy S2K".into()))?;
    let (hash, hash_param) = s2k.hash();
    info.key_setup_algo = Some(hash);
    info.key_setup_param = hash_param;
    info.key_setup_iterations = s2k.hash_bytes().unwrap_or(0);
    info.salt = s2k.salt().map(|s| s.to_vec()).unwrap_or_default();
    info.s2k = Some(s2k);
    t!("{} key from {:?}", cipher, s2k);

    let esk = body.remaining();
    if esk > 0 {
        if esk < MIN_ESK_SIZE || esk > MAX_ESK_SIZE {
            return Err(bad_data!("Encrypted session key of {} bytes", esk));
        }
        info.data = Span::new(body.tell(), esk);
        body.skip(esk)?;
    }
    Ok(())
}

/// Writes an SKE packet.
pub fn write_ske(o: &mut dyn io::Write, p: &KekParams) -> Result<()> {
    let s2k = match p.key_setup {
        KeySetup::S2K(s2k) => s2k,
        KeySetup::Pbkdf2 { .. } => return Err(Error::InvalidArgument(
            "SKE packets need an S2K specifier".into()).into()),
    };
    let esk = p.encrypted_key.len();
    if esk != 0 && (esk < MIN_ESK_SIZE || esk > MAX_ESK_SIZE) {
        return Err(Error::InvalidArgument(
            format!("Encrypted session key of {} bytes", esk)).into());
    }
    let cipher = algorithm_to_pgp(p.crypt_algo, p.key_size,
                                  PgpAlgorithmClass::PasswordCrypt)?;

    let mut body = vec![SKE_VERSION, cipher];
    s2k.serialize(&mut body)?;
    body.write_all(p.encrypted_key)?;

    packet::write_packet_header(o, Tag::SKE,
                                BodyLength::Full(body.len() as u32))?;
    o.write_all(&body)?;
    Ok(())
}

/// Reads a PKE packet.
///
/// Version 2 packets are reported as version 2 (PGP 2), version 3
/// packets as version 4 (OpenPGP).
pub fn read_pke(s: &mut Stream) -> Result<QueryInfo> {
    let mut t = s.clone();
    let start = t.tell();
    let header = packet::read_object_header(&mut t, Tag::PKE, MIN_PKE_SIZE)?;
    let len = body_length(&header)?;
    let body_start = t.tell();
    let mut body = t.sub_stream(len)?;

    let mut info = QueryInfo::new(ObjectType::PkcEncryptedKey);
    read_pke_body(&mut body, &mut info)
        .map_err(|e| stream::truncated(e, "PKE packet"))?;

    info.rebase(body_start - start);
    info.size = t.tell() - start;
    *s = t;
    Ok(info)
}

fn read_pke_body(body: &mut Stream, info: &mut QueryInfo) -> Result<()> {
    info.version = match body.read_u8()? {
        2 => 2,
        3 => 4,
        v => return Err(bad_data!("PKE version {}", v)),
    };
    info.key_id = body.read_bytes(KEYID_SIZE)?.to_vec();
    let (pkc, _) = pgp_to_algorithm(body.read_u8()?, PgpAlgorithmClass::Pkc)?;
    info.crypt_algo = Some(pkc);

    let start = body.tell();
    match pkc {
        Algorithm::RSA => {
            let value = mpi::read_mpi(body, MIN_PKCSIZE, MAX_PKCSIZE)?;
            info.data = Span::new(body.tell() - value.len(), value.len());
        }
        Algorithm::Elgamal => {
            mpi::read_mpi(body, MIN_PKCSIZE, MAX_PKCSIZE)?;
            mpi::read_mpi(body, MIN_PKCSIZE, MAX_PKCSIZE)?;
            info.data = Span::new(start, body.tell() - start);
        }
        a => return Err(Error::NotAvailable(
            format!("{} session keys", a)).into()),
    }

    if body.remaining() > 0 {
        return Err(bad_data!("{} bytes of trailing data in PKE packet",
                             body.remaining()));
    }
    Ok(())
}

/// Writes a version 3 PKE packet.
pub fn write_pke(o: &mut dyn io::Write, p: &KeyTransParams) -> Result<()> {
    if p.key_id.len() != KEYID_SIZE {
        return Err(Error::InvalidArgument(
            format!("PGP key ID of {} bytes", p.key_id.len())).into());
    }
    let pkc = algorithm_to_pgp(p.pkc_algo, 0, PgpAlgorithmClass::Pkc)?;

    let mut body = vec![PKE_VERSION];
    body.extend_from_slice(p.key_id);
    body.push(pkc);
    match p.pkc_algo {
        Algorithm::RSA => mpi::write_mpi(&mut body, p.encrypted_key)?,
        Algorithm::Elgamal => body.write_all(p.encrypted_key)?,
        a => return Err(Error::InvalidArgument(
            format!("{} can't transport keys", a)).into()),
    }

    packet::write_packet_header(o, Tag::PKE,
                                BodyLength::Full(body.len() as u32))?;
    o.write_all(&body)?;
    Ok(())
}
