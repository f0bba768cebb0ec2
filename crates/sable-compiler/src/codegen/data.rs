//! Global data image.

use crate::decl::{DeclArena, DeclKind};

/// Initial values of the first `size` global cells.
///
/// Every global of the module contributes its folded initializer at its
/// offset; cells nobody initializes stay 0. Host-managed globals lying
/// beyond `size` are left to the host.
pub fn data_image(decls: &DeclArena, size: u32) -> Vec<i32> {
    let mut image = vec![0; size as usize];
    for (_, decl) in decls.iter() {
        let DeclKind::Global(global) = &decl.kind else {
            continue;
        };
        let start = global.offset as usize;
        for (cell, value) in image.iter_mut().skip(start).zip(&global.init) {
            *cell = *value;
        }
    }
    image
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;
    use sable_core::ast::AstBuilder;

    use super::*;
    use crate::codegen::tests::{AT, Harness};

    #[test]
    fn initializers_land_at_their_offsets() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);
        let table = b.init_list(vec![b.number(4, AT), b.number(5, AT)], AT);
        let unit = b.unit(
            vec![
                b.data_decl("counter", false, None, Some(b.number(9, AT)), AT),
                b.data_decl("table", true, Some(b.number(3, AT)), Some(table), AT),
                b.data_decl("limit", true, None, Some(b.number(100, AT)), AT),
                b.data_decl("tail", false, None, None, AT),
            ],
            AT,
        );

        let mut h = Harness::default();
        h.compile(&unit).unwrap();
        let size = h.env.global_size();
        assert_eq!(size, 5);
        assert_eq!(data_image(&h.decls, size), vec![9, 4, 5, 0, 0]);
    }
}
