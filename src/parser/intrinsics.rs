//! Names that look like procedure calls but never refer to project code:
//! the standard intrinsic procedures plus statement keywords whose syntax
//! resembles a function reference (`if (...)`, `allocate (...)`, ...).

use std::sync::LazyLock;

use rustc_hash::FxHashSet;

static INTRINSIC_PROCS: &[&str] = &[
    // Statement keywords with call-like syntax
    "allocate",
    "associate",
    "backspace",
    "case",
    "close",
    "deallocate",
    "do",
    "endfile",
    "flush",
    "forall",
    "format",
    "goto",
    "if",
    "inquire",
    "nullify",
    "open",
    "print",
    "read",
    "return",
    "rewind",
    "select",
    "stop",
    "where",
    "while",
    "write",
    // Intrinsic procedures
    "abs",
    "achar",
    "acos",
    "acosh",
    "adjustl",
    "adjustr",
    "aimag",
    "aint",
    "all",
    "allocated",
    "anint",
    "any",
    "asin",
    "asinh",
    "associated",
    "atan",
    "atan2",
    "atanh",
    "bessel_j0",
    "bessel_j1",
    "bessel_jn",
    "bessel_y0",
    "bessel_y1",
    "bessel_yn",
    "bge",
    "bgt",
    "bit_size",
    "ble",
    "blt",
    "btest",
    "ceiling",
    "char",
    "cmplx",
    "command_argument_count",
    "conjg",
    "cos",
    "cosh",
    "count",
    "cpu_time",
    "cshift",
    "date_and_time",
    "dble",
    "digits",
    "dim",
    "dot_product",
    "dprod",
    "dshiftl",
    "dshiftr",
    "eoshift",
    "epsilon",
    "erf",
    "erfc",
    "erfc_scaled",
    "execute_command_line",
    "exp",
    "exponent",
    "extends_type_of",
    "findloc",
    "float",
    "floor",
    "fraction",
    "gamma",
    "get_command",
    "get_command_argument",
    "get_environment_variable",
    "huge",
    "hypot",
    "iachar",
    "iall",
    "iand",
    "iany",
    "ibclr",
    "ibits",
    "ibset",
    "ichar",
    "ieor",
    "image_index",
    "index",
    "int",
    "ior",
    "iparity",
    "is_contiguous",
    "is_iostat_end",
    "is_iostat_eor",
    "ishft",
    "ishftc",
    "kind",
    "lbound",
    "leadz",
    "len",
    "len_trim",
    "lge",
    "lgt",
    "lle",
    "llt",
    "log",
    "log10",
    "log_gamma",
    "logical",
    "matmul",
    "max",
    "maxexponent",
    "maxloc",
    "maxval",
    "merge",
    "merge_bits",
    "min",
    "minexponent",
    "minloc",
    "minval",
    "mod",
    "modulo",
    "move_alloc",
    "mvbits",
    "nearest",
    "new_line",
    "nint",
    "norm2",
    "not",
    "num_images",
    "out_of_range",
    "pack",
    "parity",
    "popcnt",
    "poppar",
    "precision",
    "present",
    "product",
    "radix",
    "random_number",
    "random_seed",
    "range",
    "real",
    "repeat",
    "reshape",
    "rrspacing",
    "same_type_as",
    "scale",
    "scan",
    "selected_char_kind",
    "selected_int_kind",
    "selected_real_kind",
    "set_exponent",
    "shape",
    "shifta",
    "shiftl",
    "shiftr",
    "sign",
    "sin",
    "sinh",
    "size",
    "spacing",
    "spread",
    "sqrt",
    "storage_size",
    "sum",
    "system_clock",
    "tan",
    "tanh",
    "this_image",
    "tiny",
    "trailz",
    "transfer",
    "transpose",
    "trim",
    "ubound",
    "unpack",
    "verify",
];

static INTRINSIC_SET: LazyLock<FxHashSet<&'static str>> =
    LazyLock::new(|| INTRINSIC_PROCS.iter().copied().collect());

/// Is `name` (already lower-cased) an intrinsic procedure or a statement
/// keyword, and therefore never a call into project code?
pub fn is_intrinsic(name: &str) -> bool {
    INTRINSIC_SET.contains(name)
}
