//! Global data declarations.

use sable_core::ast::{DataDecl, Expr};
use sable_core::CompilationError;

use super::Binder;
use crate::decl::{DeclKind, GlobalInfo};

impl<'b, 'ast> Binder<'b, 'ast> {
    pub(super) fn bind_data(&mut self, data: &'ast DataDecl<'ast>) -> Result<(), CompilationError> {
        let name = data.name.name;
        if self.env.module_symbol(name).is_some() {
            return Err(CompilationError::Redefinition {
                name: name.to_string(),
                span: data.name.span,
            });
        }

        let invalid = |message: &str, span| CompilationError::InvalidInitializer {
            name: name.to_string(),
            message: message.to_string(),
            span,
        };

        if let Some(array) = data.array {
            let size = self.fold(array.size)?;
            if size <= 0 {
                return Err(CompilationError::InvalidArraySize {
                    size,
                    span: array.span,
                });
            }
            let size = u32::try_from(size).map_err(|_| CompilationError::ValueOutOfRange {
                value: size,
                span: array.span,
            })?;

            let init = match data.init {
                None => Vec::new(),
                Some(Expr::InitList(list)) => {
                    if list.items.len() > size as usize {
                        return Err(invalid(
                            &format!("{} values for {} element(s)", list.items.len(), size),
                            list.span,
                        ));
                    }
                    list.items
                        .iter()
                        .map(|item| self.fold_cell(item))
                        .collect::<Result<Vec<_>, _>>()?
                }
                Some(other) => return Err(invalid("an array needs an initializer list", other.span())),
            };

            let offset = self.env.allocate_global(size, data.span)?;
            log::trace!("array '{}' at {} ({} cells)", name, offset, size);
            let id = self.decls.alloc(
                name,
                data.name.span,
                DeclKind::Global(GlobalInfo {
                    offset,
                    size,
                    init,
                    is_array: true,
                }),
            );
            self.env.define_global(name, id);
            data.decl.set(id);
            return Ok(());
        }

        if let Some(Expr::InitList(list)) = data.init {
            return Err(invalid("an initializer list needs an array", list.span));
        }

        if data.is_const {
            let init = data
                .init
                .ok_or_else(|| invalid("a constant needs a value", data.span))?;
            let value = self.fold_cell(init)?;
            let id = self.decls.alloc(name, data.name.span, DeclKind::Constant(value));
            self.env.define_constant(name, id);
            data.decl.set(id);
            return Ok(());
        }

        let init = match data.init {
            Some(expr) => vec![self.fold_cell(expr)?],
            None => Vec::new(),
        };
        let offset = self.env.allocate_global(1, data.span)?;
        let id = self.decls.alloc(
            name,
            data.name.span,
            DeclKind::Global(GlobalInfo {
                offset,
                size: 1,
                init,
                is_array: false,
            }),
        );
        self.env.define_global(name, id);
        data.decl.set(id);
        Ok(())
    }
}
