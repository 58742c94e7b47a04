//! Well-known modules that are not part of any project.
//!
//! A `use` of one of these resolves to an external link instead of staying
//! an unresolved name. User-supplied `extra_mods` take precedence, so a
//! project can override an entry or add vendor modules of its own.

use crate::base::fold_name;
use crate::settings::ProjectSettings;

const GFORTRAN_ISO_FORTRAN_ENV: &str =
    "https://gcc.gnu.org/onlinedocs/gfortran/ISO_005fFORTRAN_005fENV.html";
const GFORTRAN_ISO_C_BINDING: &str =
    "https://gcc.gnu.org/onlinedocs/gfortran/ISO_005fC_005fBINDING.html";
const GFORTRAN_IEEE: &str = "https://gcc.gnu.org/onlinedocs/gfortran/IEEE-modules.html";
const OPENMP_SPEC: &str = "https://www.openmp.org/specifications/";
const OPENACC_SPEC: &str = "https://www.openacc.org/specification";
const MPI_DOCS: &str = "https://www.mpi-forum.org/docs/";

/// Standard intrinsic modules plus the modules of the common directive and
/// message-passing ecosystems, keyed by folded name.
const INTRINSIC_MODS: &[(&str, &str)] = &[
    ("iso_fortran_env", GFORTRAN_ISO_FORTRAN_ENV),
    ("iso_c_binding", GFORTRAN_ISO_C_BINDING),
    ("ieee_arithmetic", GFORTRAN_IEEE),
    ("ieee_exceptions", GFORTRAN_IEEE),
    ("ieee_features", GFORTRAN_IEEE),
    ("omp_lib", OPENMP_SPEC),
    ("omp_lib_kinds", OPENMP_SPEC),
    ("openacc", OPENACC_SPEC),
    ("mpi", MPI_DOCS),
    ("mpi_f08", MPI_DOCS),
];

/// The documentation URL for a non-local module, if `name` (already folded)
/// is one.
pub fn module_url(name: &str, settings: &ProjectSettings) -> Option<String> {
    settings
        .extra_mods
        .iter()
        .find(|(n, _)| fold_name(n) == name)
        .map(|(_, url)| url.clone())
        .or_else(|| {
            INTRINSIC_MODS
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, url)| (*url).to_string())
        })
}
