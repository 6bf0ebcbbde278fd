include!(concat!(env!("OUT_DIR"), "/generated_golden_tests.rs"));
