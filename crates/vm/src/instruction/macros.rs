/// Registers an instruction type under `name`.
///
/// ```ignore
/// instruction_type!(NEW_OBJECT_DEF, "NewObject", stream: StreamKind::Control, infer: infer, compute: compute);
/// ```
macro_rules! instruction_type {
	($def:ident, $name:expr, stream: $stream:expr, infer: $infer:path, compute: $compute:path $(,)?) => {
		static $def: $crate::instruction::InstructionTypeDef = $crate::instruction::InstructionTypeDef {
			name: $name,
			crate_name: env!("CARGO_PKG_NAME"),
			stream_kind: $stream,
			infer: $infer,
			compute: $compute,
		};

		inventory::submit! {
			$crate::instruction::InstructionTypeReg(&$def)
		}
	};
}
