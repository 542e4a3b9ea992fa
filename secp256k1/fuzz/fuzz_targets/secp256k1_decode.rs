#![no_main]

use arbitrary::Arbitrary;
use commonware_codec::{DecodeExt, Encode};
use commonware_secp256k1::{
    check_signature_element, CompactSignature, Config, Context, PublicKey, Signature,
};
use libfuzzer_sys::fuzz_target;
use std::sync::OnceLock;

static CONTEXT: OnceLock<Context> = OnceLock::new();

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    encoded: Vec<u8>,
    digest: [u8; 32],
}

fn fuzz(input: FuzzInput) {
    let context = CONTEXT.get_or_init(|| Context::new(Config::default()).unwrap());

    if let Ok(public_key) = PublicKey::decode(&input.encoded[..]) {
        assert_eq!(public_key.encode().as_ref(), &input.encoded[..]);
        assert_eq!(public_key.compress().decompress(), public_key.decompress());
    }

    if let Ok(signature) = Signature::decode(&input.encoded[..]) {
        assert_eq!(signature.encode().as_ref(), &input.encoded[..]);
        assert!(check_signature_element(&signature.r(), false));
        assert_eq!(
            check_signature_element(&signature.s(), true),
            signature.is_low_s()
        );
        assert_eq!(Signature::from_der(&signature.to_der()).unwrap(), signature);
    }

    if let Ok(compact) = CompactSignature::decode(&input.encoded[..]) {
        assert_eq!(compact.encode().as_ref(), &input.encoded[..]);
        assert!((27..=34).contains(&compact.header()));

        // Any recovered key must verify the signature it was recovered from
        if let Ok(public_key) = context.recover_compact(&input.digest, &compact, None) {
            let (signature, _) = compact.signature().normalize();
            if signature == *compact.signature() {
                assert!(public_key.verify(&input.digest, &signature));
            }
        }
    }
}

fuzz_target!(|input: FuzzInput| {
    fuzz(input);
});
