//! The length-prefixed signature formats of SSH and TLS.

use std::io;

use crate::Error;
use crate::Result;
use crate::query::{ObjectType, QueryInfo, Span};
use crate::serialize::{write_be_u16, write_byte, write_string32};
use crate::signature::{
    MAX_SIGNATURE_SIZE,
    MIN_SIGNATURE_SIZE,
    SignatureParams,
};
use crate::stream::{self, Stream};
use crate::types::Algorithm;

// (name, signature algorithm, hash, hash parameter)
const SSH_ALGORITHMS: &[(&str, Algorithm, Algorithm, usize)] = &[
    ("ssh-rsa", Algorithm::RSA, Algorithm::SHA1, 0),
    ("rsa-sha2-256", Algorithm::RSA, Algorithm::SHA2, 32),
    ("rsa-sha2-512", Algorithm::RSA, Algorithm::SHA2, 64),
    ("ssh-dss", Algorithm::DSA, Algorithm::SHA1, 0),
    ("ecdsa-sha2-nistp256", Algorithm::ECDSA, Algorithm::SHA2, 32),
    ("ecdsa-sha2-nistp384", Algorithm::ECDSA, Algorithm::SHA2, 48),
    ("ecdsa-sha2-nistp521", Algorithm::ECDSA, Algorithm::SHA2, 64),
];

// The longest name in the table above.
const MAX_SSH_NAME: usize = 32;

// TLS 1.2 HashAlgorithm codes.  SHA-224 (3) is deliberately absent.
const TLS_HASHES: &[(u8, Algorithm, usize)] = &[
    (1, Algorithm::MD5, 0),
    (2, Algorithm::SHA1, 0),
    (4, Algorithm::SHA2, 32),
    (5, Algorithm::SHA2, 48),
    (6, Algorithm::SHA2, 64),
];

// TLS 1.2 SignatureAlgorithm codes.
const TLS_SIGNATURES: &[(u8, Algorithm)] = &[
    (1, Algorithm::RSA),
    (2, Algorithm::DSA),
    (3, Algorithm::ECDSA),
];

fn normalize(hash: Algorithm, param: usize) -> usize {
    if hash == Algorithm::SHA2 && param == 0 { 32 } else { param }
}

fn check_signature_size(len: usize) -> Result<()> {
    if len < MIN_SIGNATURE_SIZE || len > MAX_SIGNATURE_SIZE {
        return Err(Error::BadData(
            format!("Signature of {} bytes outside {}..={}",
                    len, MIN_SIGNATURE_SIZE, MAX_SIGNATURE_SIZE)).into());
    }
    Ok(())
}

pub(crate) fn read_ssh(s: &mut Stream) -> Result<QueryInfo> {
    let mut t = s.clone();
    let start = t.tell();
    let mut info = QueryInfo::new(ObjectType::Signature);

    let total = t.read_be_u32()? as usize;
    if total > 4 + MAX_SSH_NAME + 4 + MAX_SIGNATURE_SIZE {
        return Err(Error::BadData(
            format!("SSH signature of {} bytes", total)).into());
    }
    let body_start = t.tell();
    let mut body = t.sub_stream(total)?;
    read_ssh_body(&mut body, &mut info)
        .map_err(|e| stream::truncated(e, "SSH signature"))?;
    info.rebase(body_start - start);

    info.size = t.tell() - start;
    *s = t;
    Ok(info)
}

fn read_ssh_body(body: &mut Stream, info: &mut QueryInfo) -> Result<()> {
    let name = body.read_string32(MAX_SSH_NAME)?;
    let (_, sign, hash, param) = SSH_ALGORITHMS.iter()
        .find(|(n, _, _, _)| n.as_bytes() == name)
        .ok_or_else(|| Error::NotAvailable(
            format!("SSH signature algorithm {}",
                    String::from_utf8_lossy(name))))?;
    info.crypt_algo = Some(*sign);
    info.hash_algo = Some(*hash);
    info.hash_param = *param;

    let len = body.read_be_u32()? as usize;
    check_signature_size(len)?;
    info.data = Span::new(body.tell(), len);
    body.skip(len)?;

    if body.remaining() > 0 {
        return Err(Error::BadData(
            format!("{} bytes of trailing data in SSH signature",
                    body.remaining())).into());
    }
    Ok(())
}

pub(crate) fn write_ssh(o: &mut dyn io::Write, p: &SignatureParams)
                        -> Result<()> {
    p.check_signature_size()?;
    let (hash, param) = p.require_hash()?;
    let param = normalize(hash, param);
    let (name, _, _, _) = SSH_ALGORITHMS.iter()
        .find(|(_, a, h, hp)| *a == p.sign_algo && *h == hash && *hp == param)
        .ok_or_else(|| Error::NotAvailable(
            format!("No SSH name for {} with {}", p.sign_algo, hash)))?;

    let mut body = Vec::new();
    write_string32(&mut body, name.as_bytes())?;
    write_string32(&mut body, p.signature)?;
    write_string32(o, &body)?;
    Ok(())
}

pub(crate) fn read_ssl(s: &mut Stream) -> Result<QueryInfo> {
    let mut t = s.clone();
    let start = t.tell();
    let mut info = QueryInfo::new(ObjectType::Signature);

    let len = t.read_be_u16()? as usize;
    check_signature_size(len)?;
    info.data = Span::new(t.tell() - start, len);
    t.skip(len)?;

    info.size = t.tell() - start;
    *s = t;
    Ok(info)
}

pub(crate) fn write_ssl(o: &mut dyn io::Write, p: &SignatureParams)
                        -> Result<()> {
    p.check_signature_size()?;
    write_be_u16(o, p.signature.len() as u16)?;
    o.write_all(p.signature)?;
    Ok(())
}

pub(crate) fn read_tls12(s: &mut Stream) -> Result<QueryInfo> {
    let mut t = s.clone();
    let start = t.tell();
    let mut info = QueryInfo::new(ObjectType::Signature);

    let hash_id = t.read_u8()?;
    let sig_id = t.read_u8()?;
    let (_, hash, param) = TLS_HASHES.iter()
        .find(|(i, _, _)| *i == hash_id)
        .ok_or_else(|| Error::NotAvailable(
            format!("TLS hash algorithm {}", hash_id)))?;
    let (_, sign) = TLS_SIGNATURES.iter()
        .find(|(i, _)| *i == sig_id)
        .ok_or_else(|| Error::NotAvailable(
            format!("TLS signature algorithm {}", sig_id)))?;
    info.crypt_algo = Some(*sign);
    info.hash_algo = Some(*hash);
    info.hash_param = *param;

    let len = t.read_be_u16()? as usize;
    check_signature_size(len)?;
    info.data = Span::new(t.tell() - start, len);
    t.skip(len)?;

    info.size = t.tell() - start;
    *s = t;
    Ok(info)
}

pub(crate) fn write_tls12(o: &mut dyn io::Write, p: &SignatureParams)
                          -> Result<()> {
    p.check_signature_size()?;
    let (hash, param) = p.require_hash()?;
    let param = normalize(hash, param);
    let (hash_id, _, _) = TLS_HASHES.iter()
        .find(|(_, h, hp)| *h == hash && *hp == param)
        .ok_or_else(|| Error::NotAvailable(
            format!("No TLS 1.2 code for {} ({})", hash, param)))?;
    let (sig_id, _) = TLS_SIGNATURES.iter()
        .find(|(_, a)| *a == p.sign_algo)
        .ok_or_else(|| Error::NotAvailable(
            format!("No TLS 1.2 code for {}", p.sign_algo)))?;

    write_byte(o, *hash_id)?;
    write_byte(o, *sig_id)?;
    write_be_u16(o, p.signature.len() as u16)?;
    o.write_all(p.signature)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{read_signature, write_signature, SignatureFormat};

    fn kind(e: &anyhow::Error) -> Option<&Error> {
        e.downcast_ref::<Error>()
    }

    #[test]
    fn ssh_names() {
        let sig = [0x33; 40];
        for (name, sign, hash, param) in SSH_ALGORITHMS {
            let p = SignatureParams::new(*sign, &sig).hash(*hash, *param);
            let blob = write_signature(SignatureFormat::Ssh, &p).unwrap();
            assert_eq!(&blob[8..8 + name.len()], name.as_bytes());
            let info = read_signature(SignatureFormat::Ssh, &blob).unwrap();
            assert_eq!((info.crypt_algo, info.hash_algo, info.hash_param),
                       (Some(*sign), Some(*hash), *param));
        }

        let p = SignatureParams::new(Algorithm::DSA, &sig)
            .hash(Algorithm::SHA2, 32);
        assert!(write_signature(SignatureFormat::Ssh, &p).is_err());
    }

    #[test]
    fn ssh_unknown_name() {
        let mut body = Vec::new();
        write_string32(&mut body, b"ssh-ed25519").unwrap();
        write_string32(&mut body, &[0; 64]).unwrap();
        let mut blob = Vec::new();
        write_string32(&mut blob, &body).unwrap();
        let e = read_signature(SignatureFormat::Ssh, &blob).unwrap_err();
        assert!(matches!(kind(&e), Some(Error::NotAvailable(_))));
    }

    #[test]
    fn ssh_inner_lengths() {
        // The inner signature claims more than the outer length.
        let mut body = Vec::new();
        write_string32(&mut body, b"ssh-rsa").unwrap();
        write_string32(&mut body, &[0; 64]).unwrap();
        body.truncate(body.len() - 1);
        let mut blob = Vec::new();
        write_string32(&mut blob, &body).unwrap();
        let e = read_signature(SignatureFormat::Ssh, &blob).unwrap_err();
        assert!(matches!(kind(&e), Some(Error::BadData(_))), "{}", e);
    }

    #[test]
    fn tls12_codes() {
        let sig = [0x44; 72];
        let p = SignatureParams::new(Algorithm::ECDSA, &sig)
            .hash(Algorithm::SHA2, 64);
        let blob = write_signature(SignatureFormat::Tls12, &p).unwrap();
        assert_eq!(&blob[..4], &[6, 3, 0, 72]);

        // SHA-224 isn't supported.
        let mut bad = blob.clone();
        bad[0] = 3;
        let e = read_signature(SignatureFormat::Tls12, &bad).unwrap_err();
        assert!(matches!(kind(&e), Some(Error::NotAvailable(_))));
        let p = SignatureParams::new(Algorithm::ECDSA, &sig)
            .hash(Algorithm::SHA2, 28);
        assert!(write_signature(SignatureFormat::Tls12, &p).is_err());

        let mut bad = blob;
        bad[1] = 7;
        assert!(read_signature(SignatureFormat::Tls12, &bad).is_err());
    }

    #[test]
    fn ssl() {
        let sig = [0x55; 36];
        let p = SignatureParams::new(Algorithm::RSA, &sig);
        let blob = write_signature(SignatureFormat::Ssl, &p).unwrap();
        assert_eq!(&blob[..2], &[0, 36]);
        let info = read_signature(SignatureFormat::Ssl, &blob).unwrap();
        assert_eq!(info.size, 38);
        assert_eq!(info.crypt_algo, None);

        let e = read_signature(SignatureFormat::Ssl, &blob[..20]).unwrap_err();
        assert_eq!(kind(&e), Some(&Error::Underflow));
        let e = read_signature(SignatureFormat::Ssl, &[0, 4, 1, 2, 3, 4])
            .unwrap_err();
        assert!(matches!(kind(&e), Some(Error::BadData(_))));
    }

    #[test]
    fn ssl_length_cannot_wrap() {
        // 65576 would be written as 40.
        let sig = vec![0x55; 65576];
        let p = SignatureParams::new(Algorithm::RSA, &sig);
        let e = write_signature(SignatureFormat::Ssl, &p).unwrap_err();
        assert!(matches!(kind(&e), Some(Error::InvalidArgument(_))));

        let sig = vec![0x55; MAX_SIGNATURE_SIZE];
        let p = SignatureParams::new(Algorithm::RSA, &sig);
        let blob = write_signature(SignatureFormat::Ssl, &p).unwrap();
        let info = read_signature(SignatureFormat::Ssl, &blob).unwrap();
        assert_eq!(info.data.slice(&blob).unwrap(), &sig[..]);
    }
}
