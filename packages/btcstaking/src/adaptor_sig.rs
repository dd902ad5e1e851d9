use crate::error::Error;
use crate::Result;

use k256::elliptic_curve::group::prime::PrimeCurveAffine;
use k256::schnorr::VerifyingKey;
use k256::{
    elliptic_curve::{
        ops::{MulByGenerator, Reduce},
        point::{AffineCoordinates, DecompressPoint},
        PrimeField,
    },
    AffinePoint, ProjectivePoint, Scalar, U256,
};
use sha2::{Digest, Sha256};

/// Size of a scalar on the secp256k1 curve
const MODNSCALAR_SIZE: usize = 32;

/// Size of a compressed point on the secp256k1 curve
const COMPRESSED_POINT_SIZE: usize = 33;

/// Serialized size of a Schnorr adaptor signature: a compressed point `R`,
/// a scalar `s_hat`, and a `needs_negation` byte
pub const ADAPTOR_SIGNATURE_SIZE: usize = COMPRESSED_POINT_SIZE + MODNSCALAR_SIZE + 1;

const CHALLENGE_TAG: &[u8] = b"BIP0340/challenge";

/// A Schnorr adaptor signature, committing to an encryption key `T`.
/// Decrypting it with the discrete log of `T` yields a valid BIP-340
/// signature; this is what makes covenant slashing pre-authorisations
/// selective per finality provider.
pub struct AdaptorSignature {
    r: ProjectivePoint,
    s_hat: Scalar,
    needs_negation: bool,
}

fn tagged_hash(tag: &[u8]) -> Sha256 {
    let tag_hash = Sha256::digest(tag);
    let mut digest = Sha256::new();
    digest.update(tag_hash);
    digest.update(tag_hash);
    digest
}

pub fn bytes_to_even_point(bytes: &[u8]) -> Result<ProjectivePoint> {
    let p_option = AffinePoint::decompress(
        k256::FieldBytes::from_slice(bytes),
        k256::elliptic_curve::subtle::Choice::from(0u8),
    );
    if p_option.is_some().into() {
        Ok(ProjectivePoint::from(p_option.unwrap()))
    } else {
        Err(Error::DecompressPointFailed {})
    }
}

impl AdaptorSignature {
    /// Verifies the adaptor signature of `msg` under the signing key
    /// `pub_key` and the encryption key `enc_key`.
    pub fn verify(
        &self,
        pub_key: &VerifyingKey,
        enc_key: &VerifyingKey,
        msg: [u8; 32],
    ) -> Result<()> {
        let pk = pub_key.to_bytes();
        let p = bytes_to_even_point(pk.as_slice())?;
        let ek = enc_key.to_bytes();
        let t = bytes_to_even_point(ek.as_slice())?;

        // R' = R - T, or R + T if negation is needed
        let r_hat = if self.needs_negation {
            self.r + t
        } else {
            self.r - t
        };
        let r_hat = r_hat.to_affine();

        // e = tagged_hash("BIP0340/challenge", R.x || P || m) mod n
        let r_bytes = self.r.to_affine().x();
        let p_bytes = pub_key.to_bytes();
        let e = <Scalar as Reduce<U256>>::reduce_bytes(
            &tagged_hash(CHALLENGE_TAG)
                .chain_update(r_bytes)
                .chain_update(p_bytes.as_slice())
                .chain_update(msg)
                .finalize(),
        );

        // expected R' = s_hat*G - e*P
        let s_hat_g = ProjectivePoint::mul_by_generator(&self.s_hat);
        let e_p = p * e;
        let expected_r_hat = (s_hat_g - e_p).to_affine();

        if expected_r_hat.is_identity().into() {
            return Err(Error::PointAtInfinity("expected R'".to_string()));
        }
        if self.r.to_affine().y_is_odd().into() {
            return Err(Error::PointWithOddY("R".to_string()));
        }
        if !r_hat.eq(&expected_r_hat) {
            return Err(Error::VerifyAdaptorSigFailed {});
        }

        Ok(())
    }

    /// Parses an adaptor signature from its `(R, s_hat, needs_negation)`
    /// serialization.
    pub fn from_bytes(asig_bytes: &[u8]) -> Result<Self> {
        if asig_bytes.len() != ADAPTOR_SIGNATURE_SIZE {
            return Err(Error::MalformedAdaptorSignature(
                ADAPTOR_SIGNATURE_SIZE,
                asig_bytes.len(),
            ));
        }
        if asig_bytes[0] != 0x02 && asig_bytes[0] != 0x03 {
            return Err(Error::InvalidAdaptorSignatureFirstByte(asig_bytes[0]));
        }
        let is_y_odd = asig_bytes[0] == 0x03;
        let r_option = AffinePoint::decompress(
            k256::FieldBytes::from_slice(&asig_bytes[1..COMPRESSED_POINT_SIZE]),
            k256::elliptic_curve::subtle::Choice::from(is_y_odd as u8),
        );
        let r = if r_option.is_some().into() {
            r_option.unwrap().into()
        } else {
            return Err(Error::DecompressPointFailed {});
        };

        let s_hat_bytes = &asig_bytes[COMPRESSED_POINT_SIZE..COMPRESSED_POINT_SIZE + MODNSCALAR_SIZE];
        let s_hat_field_bytes = *k256::FieldBytes::from_slice(s_hat_bytes);
        let s_hat =
            Scalar::from_repr_vartime(s_hat_field_bytes).ok_or(Error::FailedToParseScalar {})?;

        let needs_negation = asig_bytes[COMPRESSED_POINT_SIZE + MODNSCALAR_SIZE] == 0x01;
        Ok(AdaptorSignature {
            r,
            s_hat,
            needs_negation,
        })
    }
}
