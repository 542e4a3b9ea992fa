#![no_main]

use arbitrary::Arbitrary;
use commonware_codec::{DecodeExt, Encode};
use commonware_secp256k1::{CompactSignature, Config, Context, SecretKey};
use libfuzzer_sys::fuzz_target;
use std::sync::OnceLock;

static CONTEXT: OnceLock<Context> = OnceLock::new();

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    secret: [u8; 32],
    compressed: bool,
    digest: [u8; 32],
    tweak: [u8; 32],
    test_case: u32,
}

fn fuzz(input: FuzzInput) {
    let context = CONTEXT.get_or_init(|| Context::new(Config::default()).unwrap());
    let Ok(secret) = SecretKey::from_bytes(&input.secret, input.compressed) else {
        return;
    };
    let public_key = secret.public_key().unwrap();

    // Signing
    let signature = context
        .sign_with_test_case(&secret, &input.digest, input.test_case)
        .unwrap();
    assert!(signature.is_low_s());
    assert!(public_key.verify(&input.digest, &signature));

    // Recovery
    let compact = context.sign_compact(&secret, &input.digest).unwrap();
    let compact = CompactSignature::decode(compact.encode()).unwrap();
    let recovered = context
        .recover_compact(&input.digest, &compact, Some(&public_key))
        .unwrap();
    assert_eq!(recovered, public_key);

    // Tweaks
    let child = context.tweak_secret(&secret, &input.tweak);
    let child_public = context.tweak_public(&public_key, &input.tweak);
    match (child, child_public) {
        (Ok(child), Ok(child_public)) => {
            assert_eq!(child.public_key().unwrap(), child_public);
        }
        (Err(_), Err(_)) => {}
        (child, child_public) => panic!(
            "tweaks disagree: secret={:?} public={:?}",
            child.is_ok(),
            child_public.is_ok()
        ),
    }
}

fuzz_target!(|input: FuzzInput| {
    fuzz(input);
});
