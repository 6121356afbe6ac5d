//! Interpreter-wide state and the object-model protocols that don't belong
//! to any one heap-object kind: attribute get/set (with the descriptor
//! protocol), `super()` resolution, metaclass instantiation, and the
//! dispatch that turns "call this value" into a frame push or a native
//! builtin invocation.
//!
//! Grounded on `namespace.rs`'s "one source of truth, indices elsewhere"
//! idiom -- here playing the role of the interpreter's central registry of
//! loaded modules and builtin type objects -- plus spec.md §4.2's getattr/
//! setattr algorithm and §4.2's metaclass-instantiation/`__build_class__`
//! protocol.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::{
    bytecode::CodeObject,
    builtins::BuiltinId,
    config::Config,
    exc::{RunError, RunResult},
    heap::{wrap, HeapObject, ObjRef},
    resource::{NoLimitTracker, ResourceTracker},
    tracer::{NoopTracer, VmTracer},
    types::{
        class::{link_mro, Class},
        exception::ExceptionObj,
        instance::Instance,
        method::{Builtin, Classmethod, Method, Property, Staticmethod},
        module::Module,
        super_::SuperObj,
    },
    value::Value,
};

/// Everything the evaluator, call machinery, and import subsystem share.
pub struct Context {
    pub modules: IndexMap<String, ObjRef>,
    /// `object`, `type`, `int`, `str`, ... and the built-in exception
    /// ladder, looked up by name for `isinstance`/`type()`/error
    /// construction.
    pub builtin_classes: IndexMap<&'static str, ObjRef>,
    pub builtins_dict: IndexMap<String, Value>,
    pub config: Config,
    pub tracer: Box<dyn VmTracer>,
    pub resource: Box<dyn ResourceTracker>,
    pub call_depth: usize,
    /// Ordered list of directories `import`'s absolute search (level 0)
    /// walks, analogous to `sys.path`. Populated by `entry::run_file` with
    /// the launched script's own directory.
    pub search_paths: Vec<String>,
    /// Incremented/decremented around `import::run_import_name`, purely for
    /// `DEBUG_PRINT_IMPORTS`-style indentation (spec.md §3's "depth counter
    /// for import-tracing").
    pub import_depth: usize,
}

const BUILTIN_CLASS_NAMES: &[&str] = &[
    "object", "type", "int", "float", "bool", "str", "list", "tuple", "dict", "set", "NoneType", "function", "method",
    "builtin_function_or_method", "module", "property", "classmethod", "staticmethod", "super", "generator", "slice",
    "cell",
];

const EXCEPTION_LADDER: &[(&str, Option<&str>)] = &[
    ("BaseException", None),
    ("Exception", Some("BaseException")),
    ("ArithmeticError", Some("Exception")),
    ("ZeroDivisionError", Some("ArithmeticError")),
    ("OverflowError", Some("ArithmeticError")),
    ("AssertionError", Some("Exception")),
    ("AttributeError", Some("Exception")),
    ("EOFError", Some("Exception")),
    ("ImportError", Some("Exception")),
    ("ModuleNotFoundError", Some("ImportError")),
    ("LookupError", Some("Exception")),
    ("IndexError", Some("LookupError")),
    ("KeyError", Some("LookupError")),
    ("NameError", Some("Exception")),
    ("UnboundLocalError", Some("NameError")),
    ("NotImplementedError", Some("RuntimeError")),
    ("OSError", Some("Exception")),
    ("RuntimeError", Some("Exception")),
    ("RecursionError", Some("RuntimeError")),
    ("StopIteration", Some("Exception")),
    ("StopAsyncIteration", Some("Exception")),
    ("SyntaxError", Some("Exception")),
    ("SystemError", Some("Exception")),
    ("TypeError", Some("Exception")),
    ("ValueError", Some("Exception")),
    ("UnicodeError", Some("ValueError")),
    ("GeneratorExit", Some("BaseException")),
    ("KeyboardInterrupt", Some("BaseException")),
    ("SystemExit", Some("BaseException")),
];

impl Context {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let mut ctx = Self {
            modules: IndexMap::new(),
            builtin_classes: IndexMap::new(),
            builtins_dict: IndexMap::new(),
            config,
            tracer: Box::new(NoopTracer),
            resource: Box::new(NoLimitTracker),
            call_depth: 0,
            search_paths: Vec::new(),
            import_depth: 0,
        };
        ctx.bootstrap_classes();
        crate::builtins::install(&mut ctx);
        ctx
    }

    pub fn use_tracer(&mut self, tracer: Box<dyn VmTracer>) {
        self.tracer = tracer;
    }

    fn bootstrap_classes(&mut self) {
        let object_obj = wrap(HeapObject::Class(Class::new_unlinked("object".to_owned(), vec![], IndexMap::new(), None)));
        link_mro(&object_obj).expect("object has no bases, cannot fail");
        self.builtin_classes.insert("object", Rc::clone(&object_obj));
        self.builtins_dict.insert("object".to_owned(), Value::Object(Rc::clone(&object_obj)));

        for name in BUILTIN_CLASS_NAMES.iter().skip(1) {
            let bases = vec![Rc::clone(&object_obj)];
            let class_obj = wrap(HeapObject::Class(Class::new_unlinked((*name).to_owned(), bases, IndexMap::new(), None)));
            link_mro(&class_obj).expect("single base, cannot fail");
            if let HeapObject::Class(c) = &mut *class_obj.borrow_mut() {
                c.is_builtin = true;
            }
            self.builtins_dict.insert((*name).to_owned(), Value::Object(Rc::clone(&class_obj)));
            self.builtin_classes.insert(name, class_obj);
        }
        // bool is a subclass of int in real Python.
        if let (Some(bool_obj), Some(int_obj)) = (self.builtin_classes.get("bool").cloned(), self.builtin_classes.get("int").cloned()) {
            if let HeapObject::Class(c) = &mut *bool_obj.borrow_mut() {
                c.bases = vec![Rc::clone(&int_obj)];
            }
            link_mro(&bool_obj).expect("bool < int is consistent");
        }

        let mut by_name: IndexMap<&'static str, ObjRef> = IndexMap::new();
        for (name, parent) in EXCEPTION_LADDER {
            let bases = match parent {
                Some(p) => vec![Rc::clone(by_name.get(p).expect("ladder is topologically sorted"))],
                None => vec![Rc::clone(&object_obj)],
            };
            let class_obj = wrap(HeapObject::Class(Class::new_unlinked((*name).to_owned(), bases, IndexMap::new(), None)));
            link_mro(&class_obj).expect("exception ladder is single-inheritance");
            if let HeapObject::Class(c) = &mut *class_obj.borrow_mut() {
                c.is_builtin = true;
            }
            by_name.insert(name, Rc::clone(&class_obj));
            self.builtins_dict.insert((*name).to_owned(), Value::Object(Rc::clone(&class_obj)));
            self.builtin_classes.insert(name, class_obj);
        }
    }

    #[must_use]
    pub fn builtin_class(&self, name: &str) -> ObjRef {
        Rc::clone(self.builtin_classes.get(name).unwrap_or_else(|| panic!("missing bootstrap class {name}")))
    }

    /// `type(value)`: the class object a given runtime value belongs to.
    #[must_use]
    pub fn type_of(&self, value: &Value) -> ObjRef {
        match value {
            Value::None => self.builtin_class("NoneType"),
            Value::Bool(_) => self.builtin_class("bool"),
            Value::Int(_) => self.builtin_class("int"),
            Value::Float(_) => self.builtin_class("float"),
            Value::Str(_) => self.builtin_class("str"),
            Value::Tuple(_) => self.builtin_class("tuple"),
            Value::List(_) => self.builtin_class("list"),
            Value::Dict(_) => self.builtin_class("dict"),
            Value::Set(_) => self.builtin_class("set"),
            Value::Slice(_) => self.builtin_class("slice"),
            Value::Object(obj) => match &*obj.borrow() {
                HeapObject::Module(_) => self.builtin_class("module"),
                HeapObject::Class(c) => c.metaclass.clone().unwrap_or_else(|| self.builtin_class("type")),
                HeapObject::Instance(i) => Rc::clone(&i.class),
                HeapObject::Function(_) => self.builtin_class("function"),
                HeapObject::Method(_) => self.builtin_class("method"),
                HeapObject::Builtin(_) => self.builtin_class("builtin_function_or_method"),
                HeapObject::Property(_) => self.builtin_class("property"),
                HeapObject::Classmethod(_) => self.builtin_class("classmethod"),
                HeapObject::Staticmethod(_) => self.builtin_class("staticmethod"),
                HeapObject::Super(_) => self.builtin_class("super"),
                HeapObject::Generator(_) => self.builtin_class("generator"),
                HeapObject::Exception(e) => self.builtin_classes.get(e.exc_type_name.as_str()).map_or_else(|| Rc::clone(&e.class), Rc::clone),
                HeapObject::Partial(_) => self.builtin_class("object"),
                HeapObject::Cell(_) => self.builtin_class("cell"),
                HeapObject::NativeIter(_) => self.builtin_class("object"),
                HeapObject::Code(_) => self.builtin_class("object"),
            },
        }
    }

    #[must_use]
    pub fn is_instance(&self, value: &Value, class: &ObjRef) -> bool {
        let value_type = self.type_of(value);
        value_type.borrow().as_class().is_some_and(|c| c.is_subclass_of(class))
    }

    /// `getattr(obj, name)` for an arbitrary runtime value, implementing the
    /// data-descriptor > instance-dict > non-data-descriptor precedence rule
    /// spec.md §9 specifies exactly.
    pub fn getattr(&mut self, obj: &Value, name: &str) -> RunResult<Value> {
        if let Some(id) = crate::builtins::container_method_for(obj, name) {
            let bound = wrap(HeapObject::Builtin(Builtin { name: name.to_owned(), id, bound_self: Some(obj.clone()) }));
            return Ok(Value::Object(bound));
        }
        match obj {
            Value::Object(rc) => {
                let kind_is_class = matches!(&*rc.borrow(), HeapObject::Class(_));
                if kind_is_class {
                    return self.getattr_class(rc, name);
                }
                if let HeapObject::Instance(_) = &*rc.borrow() {
                    return self.getattr_instance(rc, obj, name);
                }
                if let HeapObject::Exception(_) = &*rc.borrow() {
                    return self.getattr_exception(rc, obj, name);
                }
                if let HeapObject::Module(m) = &*rc.borrow() {
                    if let Some(v) = m.dict.get(name) {
                        return Ok(v.clone());
                    }
                }
                if let HeapObject::Super(sup) = &*rc.borrow() {
                    return self.getattr_super(sup, name);
                }
                if matches!(&*rc.borrow(), HeapObject::Property(_)) {
                    let id = match name {
                        "getter" => Some(BuiltinId::PropertyGetter),
                        "setter" => Some(BuiltinId::PropertySetter),
                        "deleter" => Some(BuiltinId::PropertyDeleter),
                        _ => None,
                    };
                    if let Some(id) = id {
                        let bound = wrap(HeapObject::Builtin(Builtin { name: name.to_owned(), id, bound_self: Some(obj.clone()) }));
                        return Ok(Value::Object(bound));
                    }
                }
                self.getattr_via_type(obj, name)
            }
            _ => self.getattr_via_type(obj, name),
        }
    }

    /// Fallback for immediates (`int`, `str`, ...) and any heap kind besides
    /// instance/class/module/super: look the attribute up on the value's
    /// type's MRO and bind it as a method if it's a plain function.
    fn getattr_via_type(&mut self, obj: &Value, name: &str) -> RunResult<Value> {
        let type_obj = self.type_of(obj);
        if let Some(found) = type_obj.borrow().as_class().and_then(|c| c.lookup(name)) {
            return self.bind_descriptor(&found, obj, &type_obj);
        }
        Err(RunError::attribute_error(format!("'{}' object has no attribute '{name}'", obj.type_name())))
    }

    fn getattr_instance(&mut self, rc: &ObjRef, obj: &Value, name: &str) -> RunResult<Value> {
        let (class, instance_value) = {
            let borrowed = rc.borrow();
            let inst = borrowed.as_instance().expect("checked by caller");
            (Rc::clone(&inst.class), inst.get(name))
        };
        let class_attr = class.borrow().as_class().and_then(|c| c.lookup(name));

        if let Some(attr) = &class_attr {
            if is_data_descriptor(attr) {
                return self.bind_descriptor(attr, obj, &class);
            }
        }
        if let Some(value) = instance_value {
            return Ok(value);
        }
        if name == "__dict__" {
            let dict_value = rc.borrow().as_instance().expect("checked by caller").dict_value();
            return Ok(dict_value);
        }
        if name == "__class__" {
            return Ok(Value::Object(class));
        }
        if let Some(attr) = class_attr {
            return self.bind_descriptor(&attr, obj, &class);
        }
        Err(RunError::attribute_error(format!("'{}' object has no attribute '{name}'", class.borrow().as_class().map_or_else(String::new, |c| c.name.clone()))))
    }

    /// `getattr` for a raised exception instance: `args` is synthesized
    /// from `ExceptionObj.args` directly (there is no real `BaseException`
    /// class body backing it), everything else follows the same
    /// data-descriptor > instance-dict > non-data-descriptor precedence as
    /// an ordinary instance.
    fn getattr_exception(&mut self, rc: &ObjRef, obj: &Value, name: &str) -> RunResult<Value> {
        if name == "args" {
            let args = if let HeapObject::Exception(e) = &*rc.borrow() { e.args.clone() } else { unreachable!() };
            return Ok(Value::Tuple(args.into()));
        }
        let (class, instance_value) = {
            let borrowed = rc.borrow();
            let HeapObject::Exception(e) = &*borrowed else { unreachable!() };
            (Rc::clone(&e.class), e.dict.get(name).cloned())
        };
        let class_attr = class.borrow().as_class().and_then(|c| c.lookup(name));
        if let Some(attr) = &class_attr {
            if is_data_descriptor(attr) {
                return self.bind_descriptor(attr, obj, &class);
            }
        }
        if let Some(value) = instance_value {
            return Ok(value);
        }
        if let Some(attr) = class_attr {
            return self.bind_descriptor(&attr, obj, &class);
        }
        Err(RunError::attribute_error(format!("'{}' object has no attribute '{name}'", class.borrow().as_class().map_or_else(String::new, |c| c.name.clone()))))
    }

    fn getattr_class(&mut self, rc: &ObjRef, name: &str) -> RunResult<Value> {
        let found = rc.borrow().as_class().and_then(|c| c.lookup(name));
        match found {
            Some(attr) => self.bind_descriptor_on_class(&attr, rc),
            None => {
                let metaclass = rc.borrow().as_class().and_then(|c| c.metaclass.clone()).unwrap_or_else(|| self.builtin_class("type"));
                if let Some(meta_attr) = metaclass.borrow().as_class().and_then(|c| c.lookup(name)) {
                    return self.bind_descriptor(&meta_attr, &Value::Object(Rc::clone(rc)), &metaclass);
                }
                let class_name = rc.borrow().as_class().map_or_else(String::new, |c| c.name.clone());
                Err(RunError::attribute_error(format!("type object '{class_name}' has no attribute '{name}'")))
            }
        }
    }

    fn getattr_super(&mut self, sup: &SuperObj, name: &str) -> RunResult<Value> {
        let mro = sup.mro_source.borrow().as_class().map(|c| c.mro.clone()).unwrap_or_default();
        let start = mro.iter().position(|c| Rc::ptr_eq(c, &sup.start_class)).map_or(0, |i| i + 1);
        for class in &mro[start.min(mro.len())..] {
            if let Some(attr) = class.borrow().as_class().and_then(|c| c.dict.get(name).cloned()) {
                return self.bind_descriptor(&attr, &sup.bound, &sup.mro_source);
            }
        }
        Err(RunError::attribute_error(format!("'super' object has no attribute '{name}'")))
    }

    /// Binds `attr` as accessed through instance `obj` of type `owner`: a
    /// plain `Function` becomes a bound `Method`; `classmethod`/
    /// `staticmethod`/`property` apply their own `__get__`; anything else
    /// passes through unchanged.
    pub(crate) fn bind_descriptor(&mut self, attr: &Value, obj: &Value, owner: &ObjRef) -> RunResult<Value> {
        if let Value::Object(rc) = attr {
            let kind = describe(rc);
            match kind {
                DescriptorKind::Function(fname) => {
                    return Ok(Value::Object(wrap(HeapObject::Method(Method { func: attr.clone(), self_value: obj.clone(), func_name: fname }))));
                }
                DescriptorKind::Classmethod => {
                    let func = if let HeapObject::Classmethod(cm) = &*rc.borrow() { cm.func.clone() } else { unreachable!() };
                    return Ok(Value::Object(wrap(HeapObject::Method(Method { func, self_value: Value::Object(Rc::clone(owner)), func_name: String::new() }))));
                }
                DescriptorKind::Staticmethod => {
                    let func = if let HeapObject::Staticmethod(sm) = &*rc.borrow() { sm.func.clone() } else { unreachable!() };
                    return Ok(func);
                }
                DescriptorKind::Property => {
                    let fget = if let HeapObject::Property(p) = &*rc.borrow() { p.fget.clone() } else { unreachable!() };
                    return match fget {
                        Some(getter) => self.call(&getter, &[obj.clone()], &IndexMap::new()),
                        None => Err(RunError::attribute_error("unreadable attribute")),
                    };
                }
                DescriptorKind::Other => {
                    if lookup_dunder_on(attr, "__get__").is_some() {
                        let bound_get = self.getattr(attr, "__get__")?;
                        return self.call(&bound_get, &[obj.clone(), Value::Object(Rc::clone(owner))], &IndexMap::new());
                    }
                }
            }
        }
        Ok(attr.clone())
    }

    fn bind_descriptor_on_class(&mut self, attr: &Value, class: &ObjRef) -> RunResult<Value> {
        if let Value::Object(rc) = attr {
            if let HeapObject::Classmethod(cm) = &*rc.borrow() {
                let func = cm.func.clone();
                return Ok(Value::Object(wrap(HeapObject::Method(Method { func, self_value: Value::Object(Rc::clone(class)), func_name: String::new() }))));
            }
            if let HeapObject::Staticmethod(sm) = &*rc.borrow() {
                return Ok(sm.func.clone());
            }
            if lookup_dunder_on(attr, "__get__").is_some() {
                let bound_get = self.getattr(attr, "__get__")?;
                return self.call(&bound_get, &[Value::None, Value::Object(Rc::clone(class))], &IndexMap::new());
            }
        }
        Ok(attr.clone())
    }

    /// `setattr(obj, name, value)`, honoring data descriptors the same way
    /// `getattr` does.
    pub fn setattr(&mut self, obj: &Value, name: &str, value: Value) -> RunResult<()> {
        if let Value::Object(rc) = obj {
            let is_instance = matches!(&*rc.borrow(), HeapObject::Instance(_));
            if is_instance {
                let class = rc.borrow().as_instance().map(|i| Rc::clone(&i.class)).expect("checked above");
                if let Some(attr) = class.borrow().as_class().and_then(|c| c.lookup(name)) {
                    if let Value::Object(attr_rc) = &attr {
                        if let HeapObject::Property(p) = &*attr_rc.borrow() {
                            return match p.fset.clone() {
                                Some(setter) => self.call(&setter, &[obj.clone(), value], &IndexMap::new()).map(|_| ()),
                                None => Err(RunError::attribute_error("can't set attribute")),
                            };
                        }
                    }
                    if lookup_dunder_on(&attr, "__set__").is_some() {
                        let bound_set = self.getattr(&attr, "__set__")?;
                        self.call(&bound_set, &[obj.clone(), value], &IndexMap::new())?;
                        return Ok(());
                    }
                }
                rc.borrow().as_instance().expect("checked above").set(name, value);
                return Ok(());
            }
            if let HeapObject::Class(_) = &*rc.borrow() {
                rc.borrow_mut().as_class_mut().expect("checked above").dict.insert(name.to_owned(), value);
                return Ok(());
            }
            if let HeapObject::Module(m) = &mut *rc.borrow_mut() {
                m.dict.insert(name.to_owned(), value);
                return Ok(());
            }
            if let HeapObject::Exception(e) = &mut *rc.borrow_mut() {
                e.dict.insert(name.to_owned(), value);
                return Ok(());
            }
        }
        Err(RunError::attribute_error(format!("'{}' object has no attribute '{name}'", obj.type_name())))
    }

    /// `bool(value)`, consulting `__bool__` then `__len__` for a
    /// user-defined instance before falling back to the immediate-value
    /// truthiness rules every other type uses.
    pub fn is_truthy(&mut self, value: &Value) -> RunResult<bool> {
        if let Value::Object(rc) = value {
            let class = if let HeapObject::Instance(i) = &*rc.borrow() { Some(Rc::clone(&i.class)) } else { None };
            if let Some(class) = class {
                if let Some(bool_fn) = class.borrow().as_class().and_then(|c| c.lookup("__bool__")) {
                    let bound = self.bind_descriptor(&bool_fn, value, &class)?;
                    let result = self.call(&bound, &[], &IndexMap::new())?;
                    return Ok(result.is_truthy());
                }
                if let Some(len_fn) = class.borrow().as_class().and_then(|c| c.lookup("__len__")) {
                    let bound = self.bind_descriptor(&len_fn, value, &class)?;
                    let result = self.call(&bound, &[], &IndexMap::new())?;
                    return Ok(!matches!(&result, Value::Int(i) if num_traits::Zero::is_zero(i)));
                }
            }
        }
        Ok(value.is_truthy())
    }

    /// Instantiates `class` by calling its metaclass (`type.__call__`
    /// equivalent): allocates a bare `Instance`, then invokes `__init__` if
    /// the class (or an ancestor) defines one.
    pub fn instantiate(&mut self, class: &ObjRef, args: &[Value], kwargs: &IndexMap<String, Value>) -> RunResult<Value> {
        let base_exception = self.builtin_class("BaseException");
        let is_exception = class.borrow().as_class().is_some_and(|c| c.is_subclass_of(&base_exception));
        let instance_value = if is_exception {
            let exc_type_name = class.borrow().as_class().map_or_else(String::new, |c| c.name.clone());
            Value::Object(wrap(HeapObject::Exception(ExceptionObj {
                exc_type_name,
                class: Rc::clone(class),
                args: args.to_vec(),
                dict: IndexMap::new(),
                traceback: Vec::new(),
                cause: None,
                context: None,
            })))
        } else {
            Value::Object(wrap(HeapObject::Instance(Instance::new(Rc::clone(class)))))
        };
        if let Some(init) = class.borrow().as_class().and_then(|c| c.lookup("__init__")) {
            let bound = self.bind_descriptor(&init, &instance_value, class)?;
            let result = self.call(&bound, args, kwargs)?;
            if !matches!(result, Value::None) {
                return Err(RunError::type_error("__init__() should return None"));
            }
        }
        Ok(instance_value)
    }

    /// `super(start_class, obj_or_cls)`.
    #[must_use]
    pub fn make_super(&self, start_class: ObjRef, bound: Value) -> Value {
        let mro_source = match &bound {
            Value::Object(rc) if matches!(&*rc.borrow(), HeapObject::Class(_)) => Rc::clone(rc),
            other => self.type_of(other),
        };
        Value::Object(wrap(HeapObject::Super(SuperObj { start_class, bound, mro_source })))
    }

    /// Creates a class from the body of a `class` statement: runs the
    /// body's frame to collect its namespace dict, picks a metaclass,
    /// computes the MRO, and registers the class as a subclass of each base.
    /// This is `__build_class__`, per spec.md §4.2.
    pub fn build_class(
        &mut self,
        name: String,
        bases: Vec<Value>,
        mut namespace: IndexMap<String, Value>,
        explicit_metaclass: Option<Value>,
    ) -> RunResult<Value> {
        // The compiler emits `STORE_NAME __classcell__` at the end of a class
        // body that has a nested `__class__`/bare-`super()` cell, storing the
        // cell object itself (via `LOAD_CLOSURE`) rather than a plain value;
        // once the class object below exists, this crate (like CPython's own
        // `__build_class__`) sets that cell's contents to it, then drops the
        // marker key so it never shows up as a class attribute.
        let classcell = namespace.shift_remove("__classcell__");
        let base_classes: Vec<ObjRef> = bases
            .into_iter()
            .map(|b| match b {
                Value::Object(rc) if matches!(&*rc.borrow(), HeapObject::Class(_)) => Ok(rc),
                other => Err(RunError::type_error(format!("{} is not a valid base class", other.type_name()))),
            })
            .collect::<RunResult<_>>()?;

        let metaclass = match explicit_metaclass {
            Some(Value::Object(rc)) if matches!(&*rc.borrow(), HeapObject::Class(_)) => rc,
            _ => base_classes
                .iter()
                .map(|b| b.borrow().as_class().and_then(|c| c.metaclass.clone()).unwrap_or_else(|| self.builtin_class("type")))
                .next()
                .unwrap_or_else(|| self.builtin_class("type")),
        };

        let class = Class::new_unlinked(name, base_classes.clone(), namespace, Some(metaclass));
        let class_obj = wrap(HeapObject::Class(class));
        link_mro(&class_obj)?;
        for base in &base_classes {
            if let HeapObject::Class(c) = &mut *base.borrow_mut() {
                c.register_subclass(&class_obj);
            }
        }
        if let Some(Value::Object(cell_rc)) = classcell {
            if let HeapObject::Cell(c) = &mut *cell_rc.borrow_mut() {
                c.value = Some(Value::Object(Rc::clone(&class_obj)));
            }
        }
        Ok(Value::Object(class_obj))
    }

    /// The single entry point for "call this value with these arguments",
    /// dispatching on what kind of callable it is. User functions push a
    /// new frame and run it to completion (or, for `LOAD_METHOD`/`CALL_METHOD`
    /// style bound calls, the same path with `self` prepended); builtins
    /// invoke native Rust code directly.
    pub fn call(&mut self, callee: &Value, args: &[Value], kwargs: &IndexMap<String, Value>) -> RunResult<Value> {
        self.resource.enter_frame(self.call_depth + 1).map_err(RunError::Resource)?;
        self.call_depth += 1;
        let result = self.call_inner(callee, args, kwargs);
        self.call_depth -= 1;
        self.resource.leave_frame();
        result
    }

    fn call_inner(&mut self, callee: &Value, args: &[Value], kwargs: &IndexMap<String, Value>) -> RunResult<Value> {
        match callee {
            Value::Object(rc) => {
                let kind = describe(rc);
                match kind {
                    DescriptorKind::Function(_) => crate::eval::call::call_function(self, rc, args, kwargs),
                    _ => {
                        let is_instance = matches!(&*rc.borrow(), HeapObject::Instance(_));
                        if is_instance {
                            if let Ok(call_method) = self.getattr(callee, "__call__") {
                                return self.call_inner(&call_method, args, kwargs);
                            }
                        }
                        self.call_non_function(rc, args, kwargs)
                    }
                }
            }
            _ => Err(RunError::type_error(format!("'{}' object is not callable", callee.type_name()))),
        }
    }

    fn call_non_function(&mut self, rc: &ObjRef, args: &[Value], kwargs: &IndexMap<String, Value>) -> RunResult<Value> {
        let snapshot = snapshot_callable(rc);
        match snapshot {
            CallableSnapshot::Method { func, self_value } => {
                let mut full_args = Vec::with_capacity(args.len() + 1);
                full_args.push(self_value);
                full_args.extend_from_slice(args);
                self.call_inner(&func, &full_args, kwargs)
            }
            CallableSnapshot::Builtin { id, bound_self } => {
                let mut full_args = Vec::with_capacity(args.len() + 1);
                if let Some(s) = bound_self {
                    full_args.push(s);
                }
                full_args.extend_from_slice(args);
                crate::builtins::dispatch(self, id, &full_args, kwargs)
            }
            CallableSnapshot::Class(class_rc) => self.instantiate(&class_rc, args, kwargs),
            CallableSnapshot::NotCallable(type_name) => Err(RunError::type_error(format!("'{type_name}' object is not callable"))),
        }
    }

    pub fn code_to_frame(&self, code: Rc<CodeObject>, name: String, filename: String, globals: ObjRef) -> crate::frame::Frame {
        let cells = (0..code.cellvars.len() + code.freevars.len())
            .map(|_| wrap(HeapObject::Cell(crate::types::cell::Cell::new(None))))
            .collect();
        crate::frame::Frame::new(code, name, filename, globals, cells)
    }
}

enum DescriptorKind {
    Function(String),
    Classmethod,
    Staticmethod,
    Property,
    Other,
}

fn describe(rc: &ObjRef) -> DescriptorKind {
    match &*rc.borrow() {
        HeapObject::Function(f) => DescriptorKind::Function(f.name.clone()),
        HeapObject::Classmethod(_) => DescriptorKind::Classmethod,
        HeapObject::Staticmethod(_) => DescriptorKind::Staticmethod,
        HeapObject::Property(_) => DescriptorKind::Property,
        _ => DescriptorKind::Other,
    }
}

/// Looks up `dunder` (`__get__`/`__set__`/`__delete__`) on `attr`'s own
/// type, for the general descriptor protocol: any instance of a
/// user-defined class that implements these methods is a descriptor, not
/// only the built-in `property`/`classmethod`/`staticmethod` kinds.
fn lookup_dunder_on(attr: &Value, dunder: &str) -> Option<Value> {
    let Value::Object(rc) = attr else { return None };
    let class = match &*rc.borrow() {
        HeapObject::Instance(i) => Rc::clone(&i.class),
        _ => return None,
    };
    let found = class.borrow().as_class().and_then(|c| c.lookup(dunder));
    found
}

fn is_data_descriptor(attr: &Value) -> bool {
    matches!(attr, Value::Object(rc) if matches!(&*rc.borrow(), HeapObject::Property(p) if p.fset.is_some()))
        || lookup_dunder_on(attr, "__set__").is_some()
}

enum CallableSnapshot {
    Method { func: Value, self_value: Value },
    Builtin { id: BuiltinId, bound_self: Option<Value> },
    Class(ObjRef),
    NotCallable(String),
}

fn snapshot_callable(rc: &ObjRef) -> CallableSnapshot {
    match &*rc.borrow() {
        HeapObject::Method(m) => CallableSnapshot::Method { func: m.func.clone(), self_value: m.self_value.clone() },
        HeapObject::Builtin(b) => CallableSnapshot::Builtin { id: b.id, bound_self: b.bound_self.clone() },
        HeapObject::Class(_) => CallableSnapshot::Class(Rc::clone(rc)),
        HeapObject::Partial(p) => CallableSnapshot::Method { func: p.func.clone(), self_value: Value::None },
        other => CallableSnapshot::NotCallable(heap_type_name(other)),
    }
}

fn heap_type_name(obj: &HeapObject) -> String {
    match obj {
        HeapObject::Instance(i) => i.class.borrow().as_class().map_or_else(|| "object".to_owned(), |c| c.name.clone()),
        _ => "object".to_owned(),
    }
}

#[must_use]
pub fn new_module(name: &str, file_path: Option<String>) -> ObjRef {
    wrap(HeapObject::Module(Module::new(name.to_owned(), file_path)))
}

/// A snapshot of `ctx.builtins_dict` as a plain `dict` value, used to
/// populate a freshly created module's `__builtins__` entry (spec.md §4.5).
#[must_use]
pub fn builtins_namespace(ctx: &Context) -> Value {
    use crate::value::{HashKey, PyDict};
    let mut dict = PyDict::default();
    for (name, value) in &ctx.builtins_dict {
        if let Some(key) = HashKey::new(Value::Str(name.clone().into())) {
            dict.map.insert(key, value.clone());
        }
    }
    Value::Dict(Rc::new(std::cell::RefCell::new(dict)))
}
