#![no_main]

use libfuzzer_sys::fuzz_target;
use sicxe_core::{
    decode, disassemble_range, CancellationToken, CoreConfig, Machine, ObjectFile, SymbolTable,
};

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let _ = decode([data[0], data[1], data[2], data[3]]);

    let config = CoreConfig {
        capacity: 64,
        tracing_enabled: false,
        step_limit: Some(256),
    };
    let Ok(mut machine) = Machine::new(config) else {
        return;
    };
    let code = data[..data.len().min(150)].to_vec();
    let object = ObjectFile::new(0, code, SymbolTable::new(), "FUZZ");
    if machine.load(&object).is_err() {
        return;
    }

    let _ = disassemble_range(machine.memory(), 0, object.end_address());
    let _ = machine.run(&CancellationToken::new());
});
