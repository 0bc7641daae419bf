extern crate proc_macro;

macro_rules! bail {
    ($item:expr, $fmt:literal $($tts:tt)*) => {
        return Err(Error::new_spanned(
            &$item,
            format!(concat!("reqeval: ", $fmt) $($tts)*)
        ))
    }
}

mod tagged;

use proc_macro::TokenStream;
use quote::quote;
use syn::{Error, Result};

/// Give a type a tag in a zone.
///
/// The zone is any constant expression of type `Zone` and the id is the
/// type's local id within that zone. The name defaults to the type's
/// identifier.
///
/// ```ignore
/// use reqeval::{Tagged, Zone};
///
/// const GEOMETRY: Zone = Zone(12);
///
/// #[derive(Tagged)]
/// #[tagged(zone = GEOMETRY, id = 3)]
/// struct Width(u32);
///
/// #[derive(Tagged)]
/// #[tagged(zone = GEOMETRY, id = 4, name = "height")]
/// struct Height(u32);
/// ```
#[proc_macro_derive(Tagged, attributes(tagged))]
pub fn derive_tagged(stream: TokenStream) -> TokenStream {
    let item = syn::parse_macro_input!(stream as syn::DeriveInput);
    tagged::expand(&item)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}
