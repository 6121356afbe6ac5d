//! Built-in functions and types, one small module per concern, mirroring
//! the teacher's one-file-per-builtin layout (`builtins/abs.rs`,
//! `builtins/isinstance.rs`, `builtins/dir.rs`, ...). Each builtin is
//! identified by a [`BuiltinId`] variant rather than a boxed closure, so
//! dispatch stays a plain `match` like the rest of the object model.

mod container;
mod construct;
mod descriptors;
mod introspect;
pub(crate) mod iterators;
mod print;

pub use container::method_for as container_method_for;

use indexmap::IndexMap;

use crate::{context::Context, exc::RunResult, value::Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinId {
    Print,
    Len,
    Repr,
    Str,
    Abs,
    Hash,
    Callable,
    Dir,
    Id,
    Isinstance,
    Issubclass,
    Type,
    Super,
    Property,
    PropertyGetter,
    PropertySetter,
    PropertyDeleter,
    Classmethod,
    Staticmethod,
    Iter,
    Next,
    Range,
    Enumerate,
    ListAppend,
    ListExtend,
    ListPop,
    DictGet,
    DictKeys,
    DictValues,
    DictItems,
    GetAttr,
    SetAttr,
    HasAttr,
    ListType,
    TupleType,
    DictType,
    SetType,
    IntType,
    FloatType,
    BoolType,
    BuildClass,
}

pub fn install(ctx: &mut Context) {
    let entries: &[(&str, BuiltinId)] = &[
        ("print", BuiltinId::Print),
        ("len", BuiltinId::Len),
        ("repr", BuiltinId::Repr),
        ("str", BuiltinId::Str),
        ("abs", BuiltinId::Abs),
        ("hash", BuiltinId::Hash),
        ("callable", BuiltinId::Callable),
        ("dir", BuiltinId::Dir),
        ("id", BuiltinId::Id),
        ("isinstance", BuiltinId::Isinstance),
        ("issubclass", BuiltinId::Issubclass),
        ("type", BuiltinId::Type),
        ("super", BuiltinId::Super),
        ("property", BuiltinId::Property),
        ("classmethod", BuiltinId::Classmethod),
        ("staticmethod", BuiltinId::Staticmethod),
        ("iter", BuiltinId::Iter),
        ("next", BuiltinId::Next),
        ("range", BuiltinId::Range),
        ("enumerate", BuiltinId::Enumerate),
        ("getattr", BuiltinId::GetAttr),
        ("setattr", BuiltinId::SetAttr),
        ("hasattr", BuiltinId::HasAttr),
        ("list", BuiltinId::ListType),
        ("tuple", BuiltinId::TupleType),
        ("dict", BuiltinId::DictType),
        ("set", BuiltinId::SetType),
        ("int", BuiltinId::IntType),
        ("float", BuiltinId::FloatType),
        ("bool", BuiltinId::BoolType),
        ("__build_class__", BuiltinId::BuildClass),
    ];
    for (name, id) in entries {
        let obj = crate::heap::wrap(crate::heap::HeapObject::Builtin(crate::types::method::Builtin {
            name: (*name).to_owned(),
            id: *id,
            bound_self: None,
        }));
        ctx.builtins_dict.insert((*name).to_owned(), Value::Object(obj));
    }
}

pub fn dispatch(ctx: &mut Context, id: BuiltinId, args: &[Value], kwargs: &IndexMap<String, Value>) -> RunResult<Value> {
    match id {
        BuiltinId::Print => print::print(ctx, args, kwargs),
        BuiltinId::Len => introspect::len(ctx, args),
        BuiltinId::Repr => introspect::repr(ctx, args),
        BuiltinId::Str => introspect::str_(ctx, args),
        BuiltinId::Abs => introspect::abs(args),
        BuiltinId::Hash => introspect::hash(args),
        BuiltinId::Callable => introspect::callable(ctx, args),
        BuiltinId::Dir => introspect::dir(ctx, args),
        BuiltinId::Id => introspect::id(args),
        BuiltinId::Isinstance => introspect::isinstance(ctx, args),
        BuiltinId::Issubclass => introspect::issubclass(args),
        BuiltinId::Type => introspect::type_builtin(ctx, args),
        BuiltinId::GetAttr => introspect::getattr_builtin(ctx, args),
        BuiltinId::SetAttr => introspect::setattr_builtin(ctx, args),
        BuiltinId::HasAttr => introspect::hasattr_builtin(ctx, args),
        BuiltinId::Super => descriptors::super_builtin(ctx, args),
        BuiltinId::Property => descriptors::property(args),
        BuiltinId::PropertyGetter => descriptors::property_getter(args),
        BuiltinId::PropertySetter => descriptors::property_setter(args),
        BuiltinId::PropertyDeleter => descriptors::property_deleter(args),
        BuiltinId::Classmethod => descriptors::classmethod(args),
        BuiltinId::Staticmethod => descriptors::staticmethod(args),
        BuiltinId::Iter => iterators::iter_builtin(ctx, args),
        BuiltinId::Next => iterators::next_builtin(ctx, args),
        BuiltinId::Range => iterators::range_builtin(args),
        BuiltinId::Enumerate => iterators::enumerate_builtin(args),
        BuiltinId::ListAppend
        | BuiltinId::ListExtend
        | BuiltinId::ListPop
        | BuiltinId::DictGet
        | BuiltinId::DictKeys
        | BuiltinId::DictValues
        | BuiltinId::DictItems => {
            let _ = ctx;
            container::dispatch(id, args)
        }
        BuiltinId::ListType => construct::list_builtin(ctx, args),
        BuiltinId::TupleType => construct::tuple_builtin(ctx, args),
        BuiltinId::SetType => construct::set_builtin(ctx, args),
        BuiltinId::DictType => construct::dict_builtin(ctx, args, kwargs),
        BuiltinId::IntType => construct::int_builtin(args),
        BuiltinId::FloatType => construct::float_builtin(args),
        BuiltinId::BoolType => construct::bool_builtin(ctx, args),
        BuiltinId::BuildClass => construct::build_class_builtin(ctx, args, kwargs),
    }
}
